//! Integration tests for the `example run` command.
use technomix::cli::RunOpts;
use technomix::cli::example::handle_example_run_command;
use technomix::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("TECHNOMIX_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        ..Default::default()
    };
    handle_example_run_command("simple", &opts, Some(Settings::default())).unwrap();
    assert!(tempdir.path().join("stream_prices.csv").is_file());
    assert!(!tempdir.path().join("debug_cohorts.csv").exists());
}
