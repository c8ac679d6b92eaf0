// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `adb` command-line backend for [`Device`].
//!
//! Every operation shells out to the adb program with `-s <serial>` when a
//! serial is known. Child processes are polled against a deadline and killed
//! when it passes; nothing is retried.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::SuiteConfig;
use crate::device::{ApexInfo, Device, DeviceError, InstallOptions};

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);
const SHELL_TIMEOUT: Duration = Duration::from_secs(30);
const REBOOT_TIMEOUT: Duration = Duration::from_secs(60);
// Headroom over `--staged-ready-timeout` so adb reports its own staging
// failure before the process ceiling kills it.
const INSTALL_CEILING_MARGIN: Duration = Duration::from_secs(30);

/// Device reached through the adb program.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    program: String,
    serial: Option<String>,
    boot_poll_interval: Duration,
    reconnect_timeout: Duration,
}

/// Captured result of one adb invocation.
#[derive(Debug)]
struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn combined(&self) -> String {
        let mut text = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

impl AdbDevice {
    /// Targets `serial` (or the only attached device) through `program`.
    pub fn new(program: impl Into<String>, serial: Option<String>) -> Self {
        let defaults = SuiteConfig::default();
        Self {
            program: program.into(),
            serial,
            boot_poll_interval: defaults.boot_poll_interval(),
            reconnect_timeout: defaults.boot_complete_timeout(),
        }
    }

    /// Backend configured from the suite settings.
    pub fn from_config(config: &SuiteConfig, serial: Option<String>) -> Self {
        Self {
            program: config.adb.clone(),
            serial,
            boot_poll_interval: config.boot_poll_interval(),
            reconnect_timeout: config.boot_complete_timeout(),
        }
    }

    /// Serial passed to adb, if any.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self, args: &[&str]) -> (Command, String) {
        let mut cmd = Command::new(&self.program);
        let mut rendered = self.program.clone();
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
            rendered.push_str(" -s ");
            rendered.push_str(serial);
        }
        cmd.args(args);
        for arg in args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        (cmd, rendered)
    }

    fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, DeviceError> {
        let (cmd, rendered) = self.command(args);
        debug!("running `{rendered}`");
        run_with_timeout(cmd, rendered, timeout)
    }

    fn run_checked(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, DeviceError> {
        let output = self.run(args, timeout)?;
        if !output.status.success() {
            let (_, rendered) = self.command(args);
            return Err(DeviceError::Command {
                command: rendered,
                status: output.status.to_string(),
                output: output.combined(),
            });
        }
        Ok(output)
    }

    fn boot_completed(&self, timeout: Duration) -> bool {
        match self.run(&["shell", "getprop", "sys.boot_completed"], timeout) {
            Ok(output) => output.status.success() && output.stdout.trim() == "1",
            Err(err) => {
                debug!("boot completion check failed: {err}");
                false
            }
        }
    }
}

impl Device for AdbDevice {
    fn wait_for_boot_complete(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        let deadline = Instant::now() + timeout;
        match self.run_checked(&["wait-for-device"], timeout) {
            Ok(_) => {}
            Err(DeviceError::Timeout { .. }) => return Ok(false),
            Err(err) => return Err(err),
        }
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            if self.boot_completed(remaining.min(SHELL_TIMEOUT)) {
                return Ok(true);
            }
            thread::sleep(self.boot_poll_interval.min(remaining));
        }
    }

    fn active_apexes(&mut self) -> Result<Vec<ApexInfo>, DeviceError> {
        let output = self.run_checked(
            &["shell", "pm", "list", "packages", "--apex-only", "--show-versioncode", "-f"],
            SHELL_TIMEOUT,
        )?;
        parse_apex_packages(&output.stdout)
    }

    fn install_package(
        &mut self,
        artifact: &Path,
        options: &InstallOptions,
    ) -> Result<Option<String>, DeviceError> {
        let path = artifact.to_string_lossy();
        let mut args: Vec<&str> = vec!["install"];
        if options.reinstall {
            args.push("-r");
        }
        args.extend(options.extra_args.iter().map(String::as_str));
        args.push(&path);

        let output = self.run(&args, install_ceiling(options))?;
        let text = output.combined();
        if install_succeeded(output.status, &text) {
            info!("install of {} succeeded", artifact.display());
            Ok(None)
        } else {
            info!("install of {} refused: {text}", artifact.display());
            Ok(Some(text))
        }
    }

    fn reboot(&mut self) -> Result<(), DeviceError> {
        self.run_checked(&["reboot"], REBOOT_TIMEOUT)?;
        // Until the device drops off the bus it still answers for the old boot.
        self.run_checked(&["wait-for-disconnect"], REBOOT_TIMEOUT)?;
        self.run_checked(&["wait-for-device"], self.reconnect_timeout)?;
        Ok(())
    }
}

/// Parses `pm list packages --apex-only --show-versioncode -f` output.
///
/// Lines look like `package:/system/apex/com.android.foo.apex=com.android.foo versionCode:3`.
/// Lines without the `package:` prefix are ignored.
pub fn parse_apex_packages(output: &str) -> Result<Vec<ApexInfo>, DeviceError> {
    let mut packages = Vec::new();
    for line in output.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix("package:") else {
            continue;
        };
        let (location, version) = rest
            .split_once(" versionCode:")
            .ok_or_else(|| DeviceError::Protocol(format!("missing versionCode in `{line}`")))?;
        let version_code = version
            .trim()
            .parse::<u64>()
            .map_err(|err| DeviceError::Protocol(format!("bad versionCode in `{line}`: {err}")))?;
        let (source_dir, name) = match location.rsplit_once('=') {
            Some((path, name)) => (Some(path.to_string()), name),
            None => (None, location),
        };
        if name.is_empty() {
            return Err(DeviceError::Protocol(format!("missing package name in `{line}`")));
        }
        packages.push(ApexInfo { name: name.to_string(), version_code, source_dir });
    }
    Ok(packages)
}

fn install_ceiling(options: &InstallOptions) -> Duration {
    options.timeout + INSTALL_CEILING_MARGIN
}

/// adb exits 0 for some refused installs, so the text is checked as well.
fn install_succeeded(status: ExitStatus, text: &str) -> bool {
    status.success() && !text.contains("Failure") && !text.contains("Error")
}

fn run_with_timeout(
    mut cmd: Command,
    rendered: String,
    timeout: Duration,
) -> Result<CommandOutput, DeviceError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|source| DeviceError::Spawn { command: rendered.clone(), source })?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DeviceError::Timeout { command: rendered, timeout_ms: timeout.as_millis() });
        }
        Err(source) => return Err(DeviceError::Spawn { command: rendered, source }),
    };
    Ok(CommandOutput { status, stdout: collect(stdout), stderr: collect(stderr) })
}

fn wait_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(CHILD_POLL_INTERVAL);
    }
}

// Pipes are drained on their own threads so a chatty child cannot block on a
// full pipe while we poll for its exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
