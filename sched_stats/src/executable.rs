//! Launching of external executables with optionally redirected output.
//!
//! [`Executable::execute`] returns as soon as the child is spawned.
//! [`Executable::wait`] blocks without a timeout, as does teardown of a
//! child that is still running, which waits for it after SIGTERM.

use std::{
    fmt::Display,
    fs::{self, File},
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use itertools::Itertools;
use log::{debug, error, warn};
use nix::{
    errno::Errno,
    sys::signal::{kill, Signal},
    unistd::Pid,
};

#[derive(Debug, thiserror::Error)]
pub enum ExecutableError {
    #[error("Not executable: {}", .0.display())]
    NotExecutable(PathBuf),

    #[error("{} has not been started", .0.display())]
    NotStarted(PathBuf),

    #[error("{} is already running", .0.display())]
    AlreadyStarted(PathBuf),

    #[error("Failed to send {signal:?} to process {pid}")]
    Signal {
        signal: Signal,
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("Failed to run executable")]
    IoError(#[from] io::Error),
}

fn signal_pid(pid: i32, signal: Signal) -> Result<(), ExecutableError> {
    kill(Pid::from_raw(pid), signal).map_err(|source| ExecutableError::Signal {
        signal,
        pid,
        source,
    })
}

fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// An executable with a fixed argument list.
///
/// Output files are owned by the wrapper and released on [`Executable::close`]
/// or drop, which also terminates a child that is still running.
#[derive(Debug)]
pub struct Executable {
    exec_file: PathBuf,
    extra_args: Vec<String>,
    cwd: Option<PathBuf>,
    stdout_file: Option<File>,
    stderr_file: Option<File>,
    child: Option<Child>,
}

impl Executable {
    pub fn new<I, S>(exec_file: impl Into<PathBuf>, extra_args: I) -> Result<Self, ExecutableError>
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let exec_file = exec_file.into();
        if !is_executable(&exec_file) {
            return Err(ExecutableError::NotExecutable(exec_file));
        }
        Ok(Executable {
            exec_file,
            extra_args: extra_args.into_iter().map(|a| a.to_string()).collect(),
            cwd: None,
            stdout_file: None,
            stderr_file: None,
            child: None,
        })
    }

    pub fn stdout_file(mut self, file: File) -> Self {
        self.stdout_file = Some(file);
        self
    }

    pub fn stderr_file(mut self, file: File) -> Self {
        self.stderr_file = Some(file);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn full_command(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.exec_file.display().to_string()).chain(self.extra_args.iter().cloned())
    }

    fn redirect(file: &Option<File>) -> io::Result<Stdio> {
        match file {
            Some(f) => Ok(Stdio::from(f.try_clone()?)),
            None => Ok(Stdio::inherit()),
        }
    }

    /// Spawns the executable without waiting for it.
    pub fn execute(&mut self) -> Result<(), ExecutableError> {
        if self.child.is_some() {
            return Err(ExecutableError::AlreadyStarted(self.exec_file.clone()));
        }
        debug!("execute: {}", self);
        let mut command = Command::new(&self.exec_file);
        command
            .args(&self.extra_args)
            .stdout(Executable::redirect(&self.stdout_file)?)
            .stderr(Executable::redirect(&self.stderr_file)?);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        self.child = Some(command.spawn()?);
        Ok(())
    }

    /// Blocks until the executable exits.
    ///
    /// Returns `false` after logging a diagnostic if the exit status is
    /// non-zero; that is not treated as an error.
    pub fn wait(&mut self) -> Result<bool, ExecutableError> {
        let exec_file = self.exec_file.clone();
        let child = self
            .child
            .as_mut()
            .ok_or(ExecutableError::NotStarted(exec_file))?;
        let status = child.wait()?;
        if status.success() {
            Ok(true)
        } else {
            warn!(
                "Non-zero return ({}): {}",
                status,
                self.full_command().join(" ")
            );
            Ok(false)
        }
    }

    /// Sends SIGKILL.
    pub fn kill(&mut self) -> Result<(), ExecutableError> {
        self.send_signal(Signal::SIGKILL)
    }

    /// Sends SIGTERM.
    pub fn terminate(&mut self) -> Result<(), ExecutableError> {
        self.send_signal(Signal::SIGTERM)
    }

    /// Sends SIGINT.
    pub fn interrupt(&mut self) -> Result<(), ExecutableError> {
        self.send_signal(Signal::SIGINT)
    }

    fn send_signal(&mut self, signal: Signal) -> Result<(), ExecutableError> {
        let exec_file = self.exec_file.clone();
        let child = self
            .child
            .as_mut()
            .ok_or(ExecutableError::NotStarted(exec_file))?;
        // a reaped pid may already belong to another process
        if child.try_wait()?.is_some() {
            debug!("{} already exited, not sending {:?}", self, signal);
            return Ok(());
        }
        signal_pid(child.id() as i32, signal)
    }

    fn teardown(&mut self) -> Result<(), ExecutableError> {
        self.stdout_file.take();
        self.stderr_file.take();

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        match signal_pid(child.id() as i32, Signal::SIGTERM) {
            Ok(()) => {
                let status = child.wait()?;
                debug!("{} terminated: {}", self, status);
            }
            // exited between the checks; reap it if it is still ours
            Err(ExecutableError::Signal {
                source: Errno::ESRCH,
                ..
            }) => {
                child.try_wait()?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Releases the output files, then terminates and reaps the child if it
    /// still runs. Blocks until the child exits after SIGTERM. A child that
    /// vanished in the meantime is not an error.
    pub fn close(mut self) -> Result<(), ExecutableError> {
        self.teardown()
    }
}

impl Display for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_command().join(" "))
    }
}

impl Drop for Executable {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            error!("Failed to clean up {}: {}", self.exec_file.display(), e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Executable {
        Executable::new("/bin/sh", ["-c", script]).unwrap()
    }

    #[test]
    fn test_rejects_non_executables() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain");
        fs::write(&plain, "#!/bin/sh\n").unwrap();

        for path in [plain, dir.path().to_path_buf(), dir.path().join("missing")] {
            match Executable::new(&path, Vec::<String>::new()) {
                Err(ExecutableError::NotExecutable(p)) => assert_eq!(p, path),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_accepts_executable_script() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("script");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut exe = Executable::new(&script, Vec::<String>::new()).unwrap();
        exe.execute().unwrap();
        assert!(exe.wait().unwrap());
    }

    #[test]
    fn test_wait_reports_exit_status() {
        let mut ok = sh("exit 0");
        ok.execute().unwrap();
        assert!(ok.wait().unwrap());

        let mut failing = sh("exit 2");
        failing.execute().unwrap();
        assert!(!failing.wait().unwrap());
    }

    #[test]
    fn test_not_started() {
        let mut exe = sh("exit 0");
        assert!(matches!(exe.wait(), Err(ExecutableError::NotStarted(_))));
        assert!(matches!(exe.kill(), Err(ExecutableError::NotStarted(_))));
        assert!(matches!(exe.terminate(), Err(ExecutableError::NotStarted(_))));
        assert!(matches!(exe.interrupt(), Err(ExecutableError::NotStarted(_))));
        // nothing to tear down
        assert!(exe.close().is_ok());
    }

    #[test]
    fn test_execute_twice_is_rejected() {
        let mut exe = sh("exit 0");
        exe.execute().unwrap();
        assert!(matches!(
            exe.execute(),
            Err(ExecutableError::AlreadyStarted(_))
        ));
        assert!(exe.wait().unwrap());
    }

    #[test]
    fn test_output_redirection() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.log");
        let err = dir.path().join("err.log");

        let mut exe = sh("echo hello; echo oops >&2")
            .stdout_file(File::create(&out).unwrap())
            .stderr_file(File::create(&err).unwrap());
        exe.execute().unwrap();
        assert!(exe.wait().unwrap());
        exe.close().unwrap();

        assert_eq!(fs::read_to_string(out).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(err).unwrap(), "oops\n");
    }

    #[test]
    fn test_current_dir() {
        let dir = tempdir().unwrap();
        let mut exe = sh("touch marker").current_dir(dir.path());
        exe.execute().unwrap();
        assert!(exe.wait().unwrap());
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn test_signals_stop_the_child() {
        for send in [Executable::kill, Executable::terminate, Executable::interrupt] {
            let mut exe = sh("exec sleep 30");
            exe.execute().unwrap();
            send(&mut exe).unwrap();
            assert!(!exe.wait().unwrap());
            // exited and reaped: further signals are no-ops
            assert!(exe.terminate().is_ok());
        }
    }

    fn pid_of(exe: &Executable) -> u32 {
        exe.child.as_ref().unwrap().id()
    }

    /// Reaped once `/proc/<pid>` is gone or no longer a zombie.
    fn is_reaped(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{pid}/status")) {
            Ok(status) => !status
                .lines()
                .any(|l| l.starts_with("State:") && l.contains('Z')),
            Err(_) => true,
        }
    }

    #[test]
    fn test_close_terminates_and_reaps_running_child() {
        let mut exe = sh("exec sleep 30");
        exe.execute().unwrap();
        let pid = pid_of(&exe);
        assert!(exe.close().is_ok());
        assert!(is_reaped(pid));
    }

    #[test]
    fn test_drop_terminates_and_reaps_running_child() {
        let mut exe = sh("exec sleep 30");
        exe.execute().unwrap();
        let pid = pid_of(&exe);
        drop(exe);
        assert!(is_reaped(pid));
    }

    #[test]
    fn test_close_reaps_exited_child() {
        let mut exe = sh("exit 0");
        exe.execute().unwrap();
        let pid = pid_of(&exe);
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(exe.close().is_ok());
        assert!(is_reaped(pid));
    }

    #[test]
    fn test_display_full_command() {
        let exe = sh("exit 3");
        assert_eq!(exe.to_string(), "/bin/sh -c exit 3");
    }
}
