#![cfg(test)]

use std::sync::Arc;

use serde_json::{json, Value};

use crate::archive::{MemoryArchive, ModuleArchive};
use crate::config::EngineOptions;
use crate::engine::Engine;
use crate::error::AccelError;
use crate::hooks::HookRegistry;
use crate::metadata::{MemorySource, MethodMetadata, TypeMetadata};
use crate::strategy::EntryStrategy;
use crate::testing::{
    acceleration, compute_target, descriptor_type, dispatcher_type, scenario_archive, ArchiveBuilder,
    RecordingLoader,
};
use crate::weave::{CallSiteTable, Weaver};

struct Harness {
    engine: Engine,
    table: Arc<CallSiteTable>,
    loader: RecordingLoader,
}

fn pass_through() -> HookRegistry {
    let mut hooks = HookRegistry::new();
    hooks.set_default_advice(|_| None);
    hooks
}

fn harness(options: EngineOptions, hooks: HookRegistry, loader: RecordingLoader) -> Harness {
    let table = Arc::new(CallSiteTable::new());
    let weaver: Arc<dyn Weaver> = table.clone();
    let engine = Engine::new(options, weaver)
        .with_hooks(hooks)
        .with_loader(Arc::new(loader.clone()));
    Harness { engine, table, loader }
}

fn default_harness() -> Harness {
    harness(EngineOptions::default(), pass_through(), RecordingLoader::new())
}

fn strict() -> EngineOptions {
    EngineOptions {
        strict_all_or_nothing: true,
        ..EngineOptions::default()
    }
}

fn shared(archive: MemoryArchive) -> Arc<dyn ModuleArchive> {
    Arc::new(archive)
}

/// Scenario archive plus extra types
fn archive_with(types: &[TypeMetadata]) -> Arc<dyn ModuleArchive> {
    let mut archive = scenario_archive();
    for metadata in types {
        archive.add_type(&metadata.name, crate::testing::type_json(metadata));
    }
    shared(archive)
}

#[test]
fn test_empty_archive_installs_nothing() {
    let h = default_harness();
    let installation = h.engine.install(&shared(MemoryArchive::new("empty"))).unwrap();

    assert!(installation.is_empty());
    assert!(installation.artifacts().is_empty());
    assert!(installation.teardown_handle().is_empty());
    assert!(installation.teardown().is_clean());
    assert_eq!(h.table.installed_count(), 0);
}

#[test]
fn test_unique_method_yields_one_interception() {
    let h = default_harness();
    let installation = h.engine.install(&shared(scenario_archive())).unwrap();

    assert_eq!(installation.descriptors().len(), 1);
    let installed = installation.descriptor("com.acme.ComputeAccel").unwrap();
    assert_eq!(installed.site.to_string(), "com.acme.Target.compute(int)");
    assert_eq!(installed.strategy, EntryStrategy::ArgumentPreserving);
    assert_eq!(installed.artifacts.len(), 1);
    assert_eq!(h.table.installed_count(), 1);
}

#[test]
fn test_missing_target_method_fails_descriptor() {
    let descriptor = descriptor_type(
        "com.acme.LongAccel",
        acceleration("com.acme.Target", "compute", &["long"], &[]),
    );
    let h = default_harness();
    let installation = h.engine.install(&archive_with(&[descriptor])).unwrap();

    let failure = installation.failures().iter().find(|f| f.descriptor == "com.acme.LongAccel").unwrap();
    match &failure.error {
        AccelError::NoMatchingMethod { type_name, signature } => {
            assert_eq!(type_name, "com.acme.Target");
            assert_eq!(signature, "compute(long)");
        }
        other => panic!("Expected NoMatchingMethod, got {:?}", other),
    }
    // The scenario descriptor in the same archive is unaffected
    assert!(installation.descriptor("com.acme.ComputeAccel").is_some());
}

#[test]
fn test_unresolved_target_type_fails_descriptor() {
    let descriptor = descriptor_type("com.acme.Orphan", acceleration("com.acme.Nowhere", "run", &[], &[]));
    let h = default_harness();
    let installation = h.engine.install(&archive_with(&[descriptor])).unwrap();

    assert!(matches!(
        installation.failures()[0].error,
        AccelError::NoMatchingMethod { .. }
    ));
}

#[test]
fn test_two_matching_methods_are_ambiguous() {
    let target = TypeMetadata::new("com.acme.Twice")
        .with_method(MethodMetadata::new("compute", &["int"]).returning("int"))
        .with_method(MethodMetadata::new("compute", &["int"]).returning("long"))
        .with_method(MethodMetadata::new("compute", &["int"]).bridged());
    let descriptor = descriptor_type("com.acme.TwiceAccel", acceleration("com.acme.Twice", "compute", &["int"], &[]));
    let h = default_harness();
    let installation = h.engine.install(&archive_with(&[target, descriptor])).unwrap();

    match &installation.failures()[0].error {
        AccelError::AmbiguousMethod { count, .. } => assert_eq!(*count, 2),
        other => panic!("Expected AmbiguousMethod, got {:?}", other),
    }
}

#[test]
fn test_target_may_come_from_a_user_source() {
    let descriptor = descriptor_type("com.acme.HostAccel", acceleration("com.acme.Host", "run", &[], &[]));
    let archive = shared(ArchiveBuilder::new("bundle").with_type(&descriptor).build());
    let mut host_types = MemorySource::new();
    host_types
        .insert(&TypeMetadata::new("com.acme.Host").with_method(MethodMetadata::new("run", &[])))
        .unwrap();

    let h = default_harness();
    let engine = h.engine.with_source(Arc::new(host_types));
    let installation = engine.install(&archive).unwrap();

    assert!(installation.failures().is_empty());
    assert_eq!(installation.descriptors()[0].site.to_string(), "com.acme.Host.run()");
}

fn provenance_archive(origin: &str) -> Arc<dyn ModuleArchive> {
    let target = TypeMetadata::new("com.acme.Origin")
        .with_origin(origin)
        .with_method(MethodMetadata::new("run", &[]));
    let mut values = acceleration("com.acme.Origin", "run", &[], &[]);
    values["expected_names"] = json!(["accel.jar"]);
    shared(
        ArchiveBuilder::new("bundle")
            .with_type(&descriptor_type("com.acme.OriginAccel", values))
            .with_type(&target)
            .build(),
    )
}

#[test]
fn test_provenance_filter_narrows_target() {
    let h = default_harness();
    let matching = h.engine.install(&provenance_archive("/opt/app/lib/accel.jar")).unwrap();
    assert_eq!(matching.descriptors().len(), 1);

    let h = default_harness();
    let other = h.engine.install(&provenance_archive("/opt/app/lib/other.jar")).unwrap();
    assert!(matches!(other.failures()[0].error, AccelError::NoMatchingMethod { .. }));
}

#[test]
fn test_provenance_chooses_between_same_named_types() {
    let mut host_types = MemorySource::new();
    host_types
        .insert(
            &TypeMetadata::new("com.acme.Origin")
                .with_origin("/opt/app/lib/accel.jar")
                .with_method(MethodMetadata::new("run", &[])),
        )
        .unwrap();
    let h = default_harness();
    let engine = h.engine.with_source(Arc::new(host_types.clone()));

    // The archive's own definition comes first but has the wrong origin
    let installation = engine.install(&provenance_archive("/opt/app/lib/other.jar")).unwrap();

    assert!(installation.failures().is_empty(), "{:?}", installation.failures());
    assert_eq!(installation.descriptors().len(), 1);
    assert_eq!(installation.descriptors()[0].site.to_string(), "com.acme.Origin.run()");

    let options = EngineOptions {
        suppress_provenance_filter: true,
        ..EngineOptions::default()
    };
    let h = harness(options, pass_through(), RecordingLoader::new());
    let engine = h.engine.with_source(Arc::new(host_types));
    let installation = engine.install(&provenance_archive("/opt/app/lib/other.jar")).unwrap();
    match &installation.failures()[0].error {
        AccelError::AmbiguousMethod { count, .. } => assert_eq!(*count, 2),
        other => panic!("Expected AmbiguousMethod, got {:?}", other),
    }
}

#[test]
fn test_descriptors_sharing_a_dispatcher_activate_it_once() {
    let second = descriptor_type(
        "com.acme.SecondAccel",
        acceleration("com.acme.Other", "run", &[], &[("com.acme.Dispatcher", "accel-core")]),
    );
    let other = TypeMetadata::new("com.acme.Other").with_method(MethodMetadata::new("run", &[]));
    let h = default_harness();

    let installation = h.engine.install(&archive_with(&[second, other])).unwrap();

    assert_eq!(installation.descriptors().len(), 2);
    assert!(installation.failures().is_empty());
    assert_eq!(h.loader.load_count(), 1);
    assert_eq!(h.loader.calls(), vec!["setup"]);
    assert_eq!(installation.artifacts().len(), 1);
    assert!(Arc::ptr_eq(
        &installation.descriptors()[0].artifacts[0],
        &installation.descriptors()[1].artifacts[0]
    ));
    assert_eq!(installation.teardown_handle().len(), 1);

    let report = installation.teardown();
    assert_eq!(report.invoked, 1);
    assert_eq!(h.loader.calls(), vec!["setup", "teardown"]);
}

#[test]
fn test_repeated_dispatcher_within_descriptor_is_generated_once() {
    let descriptor = descriptor_type(
        "com.acme.ComputeAccel",
        acceleration(
            "com.acme.Target",
            "compute",
            &["int"],
            &[("com.acme.Dispatcher", "accel-core"), ("com.acme.Dispatcher", "accel-core")],
        ),
    );
    let archive = shared(
        ArchiveBuilder::new("bundle")
            .with_type(&descriptor)
            .with_type(&dispatcher_type("com.acme.Dispatcher", &["setup"], &["teardown"]))
            .with_type(&compute_target())
            .with_binary("accel-core", b"fake")
            .build(),
    );
    let h = default_harness();

    let installation = h.engine.install(&archive).unwrap();

    assert_eq!(installation.descriptors()[0].artifacts.len(), 1);
    assert_eq!(installation.teardown_handle().len(), 1);
    assert_eq!(h.loader.calls(), vec!["setup"]);
}

#[test]
fn test_suppressed_provenance_filter_accepts_any_origin() {
    let options = EngineOptions {
        suppress_provenance_filter: true,
        ..EngineOptions::default()
    };
    let h = harness(options, pass_through(), RecordingLoader::new());
    let installation = h.engine.install(&provenance_archive("/opt/app/lib/other.jar")).unwrap();
    assert_eq!(installation.descriptors().len(), 1);
}

fn descriptor_with_flags(name: &str, retain: bool, simple: bool) -> TypeMetadata {
    let mut values = acceleration("com.acme.Target", "compute", &["int"], &[]);
    values["retain_arguments"] = json!(retain);
    values["simple_entry"] = json!(simple);
    descriptor_type(name, values)
}

#[test]
fn test_conflicting_strategies_on_one_site_fail_the_later_descriptor() {
    let h = default_harness();
    let installation = h
        .engine
        .install(&archive_with(&[descriptor_with_flags("com.acme.Simple", false, true)]))
        .unwrap();

    // ComputeAccel (argument preserving) is first in archive order
    match &installation.failures()[0].error {
        AccelError::StrategyConflict { site, existing, descriptor } => {
            assert_eq!(site, "com.acme.Target.compute(int)");
            assert_eq!(existing, "com.acme.ComputeAccel");
            assert_eq!(descriptor, "com.acme.Simple");
        }
        other => panic!("Expected StrategyConflict, got {:?}", other),
    }
}

#[test]
fn test_same_strategy_descriptors_share_a_site() {
    let h = default_harness();
    let installation = h
        .engine
        .install(&archive_with(&[descriptor_with_flags("com.acme.Retain", true, false)]))
        .unwrap();

    assert!(installation.failures().is_empty());
    assert_eq!(installation.descriptors().len(), 2);
    assert_eq!(h.table.installed_count(), 2);
}

#[test]
fn test_descriptor_without_bound_advice_fails() {
    let h = harness(EngineOptions::default(), HookRegistry::new(), RecordingLoader::new());
    let installation = h.engine.install(&shared(scenario_archive())).unwrap();
    assert!(matches!(
        installation.failures()[0].error,
        AccelError::UnboundAdvice { .. }
    ));
    assert_eq!(h.loader.load_count(), 0);
}

#[test]
fn test_inlined_helpers_travel_with_installation() {
    let helper = TypeMetadata::new("com.acme.Helper").with_method(MethodMetadata::new("assist", &[]));
    let mut values = acceleration("com.acme.Target", "compute", &["int"], &[]);
    values["inline"] = json!(["com.acme.Helper"]);
    let archive = shared(
        ArchiveBuilder::new("bundle")
            .with_type(&descriptor_type("com.acme.Inlining", values))
            .with_type(&compute_target())
            .with_type(&helper)
            .build(),
    );

    let h = default_harness();
    let installation = h.engine.install(&archive).unwrap();

    let inlined = &installation.descriptors()[0].inlined;
    assert_eq!(inlined.len(), 1);
    assert_eq!(inlined[0].type_name, "com.acme.Helper");
    assert_eq!(inlined[0].bytes, crate::testing::type_json(&helper));
}

#[test]
fn test_missing_inlined_helper_fails_descriptor() {
    let mut values = acceleration("com.acme.Target", "compute", &["int"], &[]);
    values["inline"] = json!(["com.acme.Gone"]);
    let h = default_harness();
    let installation = h
        .engine
        .install(&shared(
            ArchiveBuilder::new("bundle")
                .with_type(&descriptor_type("com.acme.Inlining", values))
                .with_type(&compute_target())
                .build(),
        ))
        .unwrap();

    match &installation.failures()[0].error {
        AccelError::MissingHelper { helper, .. } => assert_eq!(helper, "com.acme.Gone"),
        other => panic!("Expected MissingHelper, got {:?}", other),
    }
}

#[test]
fn test_missing_binary_fails_descriptor() {
    let descriptor = descriptor_type(
        "com.acme.NoBinary",
        acceleration("com.acme.Target", "compute", &["int"], &[("com.acme.Dispatcher", "absent")]),
    );
    let archive = shared(
        ArchiveBuilder::new("bundle")
            .with_type(&descriptor)
            .with_type(&dispatcher_type("com.acme.Dispatcher", &["setup"], &[]))
            .with_type(&compute_target())
            .build(),
    );
    let h = default_harness();
    let installation = h.engine.install(&archive).unwrap();

    assert!(matches!(
        installation.failures()[0].error,
        AccelError::MissingResource { .. }
    ));
    assert_eq!(h.loader.load_count(), 0);
}

#[test]
fn test_lazy_activation_defers_loading_to_first_call() {
    let options = EngineOptions {
        eager_activation: false,
        ..EngineOptions::default()
    };
    let h = harness(options, pass_through(), RecordingLoader::new());
    let installation = h.engine.install(&shared(scenario_archive())).unwrap();
    assert_eq!(h.loader.load_count(), 0);
    assert!(!installation.artifacts()[0].is_activated());

    let target = Arc::new(compute_target());
    let method = target.methods[0].clone();
    let site = h.table.define(target, &method, |args| args[0].clone()).unwrap();
    assert_eq!(h.table.invoke(&site, &[json!(3)]).unwrap(), json!(3));

    assert_eq!(h.loader.load_count(), 1);
    assert_eq!(h.loader.calls(), vec!["setup"]);
}

#[test]
fn test_init_failure_aborts_only_that_descriptor() {
    let second = descriptor_type(
        "com.acme.Second",
        acceleration("com.acme.Other", "run", &[], &[("com.acme.Healthy", "accel-core")]),
    );
    let other = TypeMetadata::new("com.acme.Other").with_method(MethodMetadata::new("run", &[]));
    let loader = RecordingLoader::new().failing_symbol("setup");
    let h = harness(EngineOptions::default(), pass_through(), loader);

    let installation = h
        .engine
        .install(&archive_with(&[second, other, dispatcher_type("com.acme.Healthy", &["start"], &["stop"])]))
        .unwrap();

    assert_eq!(installation.failures().len(), 1);
    assert_eq!(installation.failures()[0].descriptor, "com.acme.ComputeAccel");
    assert!(matches!(installation.failures()[0].error, AccelError::Activation { .. }));
    assert_eq!(installation.descriptors().len(), 1);
    assert_eq!(installation.descriptors()[0].descriptor, "com.acme.Second");
    // Only the failed descriptor's interception is absent
    assert_eq!(h.table.installed_count(), 1);

    let report = installation.teardown();
    assert_eq!(report.invoked, 1);
    assert_eq!(h.loader.calls(), vec!["setup", "start", "stop"]);
}

#[test]
fn test_strict_mode_rolls_back_everything() {
    let broken = descriptor_type("com.acme.Broken", acceleration("com.acme.Target", "compute", &["long"], &[]));
    let h = harness(strict(), pass_through(), RecordingLoader::new());

    let err = h.engine.install(&archive_with(&[broken])).unwrap_err();

    assert!(matches!(err, AccelError::NoMatchingMethod { .. }));
    assert_eq!(h.table.installed_count(), 0);
    // The already activated scenario dispatcher was torn down
    assert_eq!(h.loader.calls(), vec!["setup", "teardown"]);
}

#[test]
fn test_strict_mode_reports_invalid_descriptors() {
    let values: Value = json!({"type": "", "method": "compute"});
    let archive = shared(
        ArchiveBuilder::new("bundle")
            .with_type(&descriptor_type("com.acme.Invalid", values))
            .build(),
    );
    let h = harness(strict(), pass_through(), RecordingLoader::new());
    assert!(matches!(
        h.engine.install(&archive),
        Err(AccelError::InvalidDescriptor { .. })
    ));
}

#[test]
fn test_uninstall_removes_interceptions_and_tears_down() {
    let h = default_harness();
    let installation = h.engine.install(&shared(scenario_archive())).unwrap();
    assert_eq!(h.table.installed_count(), 1);

    let weaver: &dyn Weaver = &*h.table;
    let report = installation.uninstall(weaver);

    assert_eq!(h.table.installed_count(), 0);
    assert_eq!(report.invoked, 1);
    assert_eq!(h.loader.calls(), vec!["setup", "teardown"]);
}
