use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info, warn};

use super::ImageProducer;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// Tuning file for the NoIR (infrared) camera module.
pub const NOIR_TUNING_FILE: &str = "/usr/share/libcamera/ipa/rpi/vc4/imx219_noir.json";

/// Opens command-execution sessions on remote devices.
pub trait RemoteConnector {
    type Session: RemoteSession;

    fn open(&self, host: &str, user: &str, secret: Option<&str>) -> Result<Self::Session>;
}

/// An open session on a remote device.
pub trait RemoteSession {
    /// Run a shell command; non-zero exit is an error.
    fn run(&mut self, command: &str) -> Result<String>;

    /// Copy `remote` on the device to `local`.
    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()>;

    fn close(self) -> Result<()>;
}

/// Capture command for a device: `rpicam-still -o <path> [--tuning-file ..] <flags>`.
pub fn capture_command(device: &DeviceConfig) -> String {
    let mut cmd = format!("rpicam-still -o {}", device.remote_path);
    if device.noir {
        cmd.push_str(" --tuning-file ");
        cmd.push_str(NOIR_TUNING_FILE);
    }
    let flags = device.capture_flags.trim();
    if !flags.is_empty() {
        cmd.push(' ');
        cmd.push_str(flags);
    }
    cmd
}

/// A Raspberry Pi camera reached over a remote shell. Exposes one source
/// named after the device.
pub struct PiCamera<C: RemoteConnector> {
    device: DeviceConfig,
    connector: C,
}

impl<C: RemoteConnector> PiCamera<C> {
    pub fn new(device: DeviceConfig, connector: C) -> Self {
        Self { device, connector }
    }
}

impl<C: RemoteConnector> ImageProducer for PiCamera<C> {
    fn label(&self) -> String {
        format!("rpi:{}", self.device.host)
    }

    fn sources(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.device.name.clone()])
    }

    fn capture(&mut self, _source: &str, target: &Path) -> Result<()> {
        let device = &self.device;
        let mut session =
            self.connector
                .open(&device.host, &device.user, device.password.as_deref())?;
        info!(host = %device.host, user = %device.user, "Established connection");

        let result = session
            .run(&capture_command(device))
            .and_then(|_| session.fetch(&device.remote_path, target));

        // Session is closed whether or not the capture succeeded.
        if let Err(e) = session.close() {
            warn!(host = %device.host, "Failed to close session: {e}");
        }
        result
    }
}

/// Sessions backed by the system OpenSSH client, multiplexed over a control
/// socket. Password authentication goes through `sshpass`.
#[derive(Debug, Clone, Default)]
pub struct OpenSsh;

impl RemoteConnector for OpenSsh {
    type Session = SshSession;

    fn open(&self, host: &str, user: &str, secret: Option<&str>) -> Result<SshSession> {
        let session = SshSession {
            destination: format!("{user}@{host}"),
            control_path: control_path(user, host),
            secret: secret.map(str::to_string),
        };

        let mut args = session.common_args();
        args.extend(
            ["-M", "-f", "-N", "-o", "ControlPersist=yes"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(session.destination.clone());
        session.exec("ssh", &args)?;
        Ok(session)
    }
}

pub struct SshSession {
    destination: String,
    control_path: PathBuf,
    secret: Option<String>,
}

impl SshSession {
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if self.secret.is_none() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        args
    }

    fn exec(&self, program: &str, args: &[String]) -> Result<Output> {
        let mut cmd = match self.secret {
            Some(ref secret) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(program).env("SSHPASS", secret);
                cmd
            }
            None => Command::new(program),
        };
        cmd.args(args);
        debug!(program, destination = %self.destination, "Running remote command");

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("{program} {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl RemoteSession for SshSession {
    fn run(&mut self, command: &str) -> Result<String> {
        let mut args = self.common_args();
        args.push(self.destination.clone());
        args.push(command.to_string());
        let output = self.exec("ssh", &args)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()> {
        let mut args = self.common_args();
        args.push(format!("{}:{remote}", self.destination));
        args.push(local.display().to_string());
        self.exec("scp", &args)?;
        info!(path = %local.display(), "Image fetched");
        Ok(())
    }

    fn close(self) -> Result<()> {
        let mut args = self.common_args();
        args.extend(["-O".to_string(), "exit".to_string(), self.destination.clone()]);
        self.exec("ssh", &args)?;
        Ok(())
    }
}

fn control_path(user: &str, host: &str) -> PathBuf {
    std::env::temp_dir().join(format!("camsweep-{user}@{host}.sock"))
}
