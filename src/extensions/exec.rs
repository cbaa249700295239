//! Helper-process plugin module
//!
//! Runs the manifest's `exec` command for as long as the plugin is active.

use std::process::{Child, Command, Stdio};

use crate::{Error, Result};

/// Plugin backed by a long-running helper process
#[derive(Debug)]
pub struct ExecPlugin {
    location: String,
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl ExecPlugin {
    /// Create a helper plugin from an argument vector
    ///
    /// # Errors
    ///
    /// Returns error if `argv` is empty
    pub fn new(location: &str, argv: Vec<String>) -> Result<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| Error::plugin(location, "empty exec command"))?;

        Ok(Self {
            location: location.to_string(),
            program,
            args: argv.collect(),
            child: None,
        })
    }

    /// Process id of the running helper
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

impl super::Plugin for ExecPlugin {
    fn activate(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::plugin(&self.location, format!("failed to spawn helper: {e}")))?;

        tracing::debug!(
            location = %self.location,
            program = %self.program,
            pid = child.id(),
            "spawned plugin helper"
        );
        self.child = Some(child);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!(location = %self.location, %status, "plugin helper already exited");
            return Ok(());
        }

        child
            .kill()
            .map_err(|e| Error::plugin(&self.location, format!("failed to stop helper: {e}")))?;
        let status = child.wait()?;
        tracing::debug!(location = %self.location, %status, "plugin helper stopped");
        Ok(())
    }
}

impl Drop for ExecPlugin {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
