pub mod install_tests;
