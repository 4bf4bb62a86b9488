use resistim::analysis::Results;
use resistim::model::Trajectory;
use std::{env, fs, fs::File, io::BufReader, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_resistim"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[virus]\n"
        + "max_birth_prob = 0.1\n"
        + "clear_prob = 0.05\n"
        + "mut_prob = 0.005\n"
        + "resistances = { guttagonol = false, grimpex = false }\n"
        + "\n"
        + "[patient]\n"
        + "n_viruses = 100\n"
        + "max_pop = 1000\n"
        + "\n"
        + "[treatment]\n"
        + "prescriptions = [ { step = 50, drug = \"guttagonol\" }, { step = 50, drug = \"grimpex\" } ]\n"
        + "\n"
        + "[output]\n"
        + "n_trials = 8\n"
        + "n_steps = 150\n"
        + "steps_per_save = 10\n"
        + "cure_threshold = 50\n"
        + "hist_bins = 20\n"
        + "tracked = [ [\"guttagonol\"], [\"grimpex\"], [\"guttagonol\", \"grimpex\"] ]\n"
        + "seed = 1234\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    for run_idx in 0..2 {
        let run_dir = test_dir.join(format!("run-{run_idx:04}"));
        assert!(run_dir.join("seed.toml").is_file());
        for trial_idx in 0..8 {
            assert!(run_dir.join(format!("trial-{trial_idx:04}.msgpack")).is_file());
        }
    }

    // Both runs share the configured seed.
    let trial_a = Trajectory::load(test_dir.join("run-0000/trial-0003.msgpack"))
        .expect("failed to load trajectory");
    let trial_b = Trajectory::load(test_dir.join("run-0001/trial-0003.msgpack"))
        .expect("failed to load trajectory");
    assert_eq!(trial_a, trial_b);
    assert_eq!(trial_a.records.len(), 16);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results_file = File::open(test_dir.join("run-0000/results.msgpack"))
        .expect("failed to open results file");
    let results: Results = rmp_serde::from_read(BufReader::new(results_file))
        .expect("failed to deserialize results");
    assert_eq!(results.n_trials, 8);
    assert_eq!(results.steps.len(), 16);
    assert_eq!(results.resistant.len(), 3);
    assert!((0.0..=1.0).contains(&results.cure_rate));
    let final_hist = results.final_hist.expect("missing final histogram");
    assert_eq!(final_hist.counts.iter().sum::<usize>(), 8);

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_invalid_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("rejects_invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[virus]\n"
        + "max_birth_prob = 1.5\n"
        + "clear_prob = 0.05\n"
        + "mut_prob = 0.005\n"
        + "\n"
        + "[patient]\n"
        + "n_viruses = 100\n"
        + "max_pop = 1000\n"
        + "\n"
        + "[output]\n"
        + "n_trials = 1\n"
        + "n_steps = 10\n"
        + "steps_per_save = 1\n"
        + "cure_threshold = 50\n"
        + "hist_bins = 20\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_resistim"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid path"), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
