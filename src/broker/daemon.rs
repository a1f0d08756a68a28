//! Compilation daemon process management.
//!
//! The daemon is a node child process running the embedded
//! `wu-compiler.cjs` script, spoken to over stdin/stdout with a
//! length-prefixed framing. Requests are strictly serial; the caller holds
//! the broker mutex for the whole exchange.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{Context, Result, bail};

use crate::debug;

pub struct Daemon {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Daemon {
    /// Spawn the daemon from the written script, cwd at the project root
    /// so node resolves the project's compiler packages.
    pub fn spawn(script: &Path, root: &Path) -> Result<Self> {
        let mut child = Command::new("node")
            .arg(script)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn node")?;

        let stdin = child.stdin.take().context("daemon stdin unavailable")?;
        let stdout = child.stdout.take().context("daemon stdout unavailable")?;
        debug!("broker"; "compiler daemon started (pid {})", child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// One request/response exchange. Any I/O failure poisons the daemon;
    /// the caller must tear it down so the next request respawns.
    pub fn compile(
        &mut self,
        kind: &str,
        filename: &str,
        loader: &str,
        source_hint: &str,
        source: &[u8],
    ) -> Result<Vec<u8>> {
        let header = format!(
            "COMPILE\t{kind}\t{filename}\t{loader}\t{source_hint}\t{}\n",
            source.len()
        );
        self.stdin.write_all(header.as_bytes())?;
        self.stdin.write_all(source)?;
        self.stdin.flush()?;

        let mut line = String::new();
        self.stdout.read_line(&mut line)?;
        let line = line.trim_end_matches('\n');

        if let Some(len) = line.strip_prefix("OK\t") {
            let len: usize = len.parse().context("bad OK length")?;
            let mut body = vec![0u8; len];
            self.stdout.read_exact(&mut body)?;
            return Ok(body);
        }
        if let Some(msg) = line.strip_prefix("ERR\t") {
            bail!("{msg}");
        }
        bail!("malformed daemon response: {line:?}");
    }

    /// Kill the child process.
    pub fn terminate(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Tier-3 fallback: a fresh subprocess per compile, used only when the
/// daemon cannot be spawned.
pub fn compile_oneshot(
    script: &Path,
    root: &Path,
    kind: &str,
    filename: &str,
    loader: &str,
    source: &[u8],
) -> Result<Vec<u8>> {
    let mut child = Command::new("node")
        .arg(script)
        .arg("--once")
        .arg(kind)
        .arg(filename)
        .arg(loader)
        .current_dir(root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn node")?;

    child
        .stdin
        .take()
        .context("one-shot stdin unavailable")?
        .write_all(source)?;

    let output = child.wait_with_output()?;
    if !output.status.success() {
        bail!("{}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(output.stdout)
}
