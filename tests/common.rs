use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

// Each test file pulls in only the helpers it needs.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub home: PathBuf,
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let home = temp_dir.path().join("home");
        let config_dir = temp_dir.path().join("autonomix");
        fs::create_dir_all(&home).expect("Failed to create home dir");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_autonomix"));

        Self {
            config_path: config_dir.join("config.json"),
            _temp_dir: temp_dir,
            home,
            config_dir,
            bin_path,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("HOME", &self.home);
        cmd.env("AUTONOMIX_HOME", &self.config_dir);
        cmd.env_remove("AUTONOMIX_INSTALL_METHOD");
        cmd.env_remove("RUST_LOG");
        // Anything that slips past the offline checks fails fast.
        cmd.env("AUTONOMIX_GITHUB_API", "http://127.0.0.1:9");
        cmd
    }

    pub fn write_config(&self, content: &str) {
        fs::create_dir_all(&self.config_dir).expect("Failed to create config dir");
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(&self.config_path).expect("Failed to read config")
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run autonomix")
            .into()
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
