//! Cutout task backed by an external program.
//!
//! The program is invoked as
//!
//! ```text
//! <program> --metadata --pubdid=<did> --ra=<deg> --dec=<deg> --width=<deg> --height=<deg>
//!           [--wavelo=<m> --wavehi=<m>] [--timelo=<mjd> --timehi=<mjd>]
//!           [--polstates=<list>] [--dir=<staging>] <file>
//! ```
//!
//! and prints the virtual dataset definition as `KEY = value` lines.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use dal_common::{DalError, DalResult};

use crate::virtual_image::{parse_keyword_text, CutoutRequest, CutoutTask, KeywordMap, MDFILE};

/// Runs a cutout program once per virtual record.
#[derive(Debug, Clone)]
pub struct ProcessCutoutTask {
    program: PathBuf,
    staging_dir: Option<PathBuf>,
}

impl ProcessCutoutTask {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            staging_dir: None,
        }
    }

    /// Directory the program writes virtual dataset definitions into.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one invocation.
    pub fn arguments(&self, path: &str, request: &CutoutRequest) -> Vec<String> {
        let mut args = vec!["--metadata".to_string()];
        if let Some(did) = &request.publisher_did {
            args.push(format!("--pubdid={}", did));
        }
        push_opt(&mut args, "ra", request.ra);
        push_opt(&mut args, "dec", request.dec);
        push_opt(&mut args, "width", request.width);
        push_opt(&mut args, "height", request.height);
        push_opt(&mut args, "wavelo", request.wave_low);
        push_opt(&mut args, "wavehi", request.wave_high);
        push_opt(&mut args, "timelo", request.time_low);
        push_opt(&mut args, "timehi", request.time_high);
        push_opt(&mut args, "polstates", request.pol_states.as_deref());
        if let Some(dir) = &self.staging_dir {
            args.push(format!("--dir={}", dir.display()));
        }
        args.push(path.to_string());
        args
    }
}

fn push_opt<T: Display>(args: &mut Vec<String>, name: &str, value: Option<T>) {
    if let Some(value) = value {
        args.push(format!("--{}={}", name, value));
    }
}

impl CutoutTask for ProcessCutoutTask {
    fn compute(&self, path: &str, request: &CutoutRequest) -> DalResult<Option<KeywordMap>> {
        let args = self.arguments(path, request);
        debug!(program = %self.program.display(), args = ?args, "Running cutout task");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                DalError::external_task(format!(
                    "cannot run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DalError::external_task(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let keywords = parse_keyword_text(&String::from_utf8_lossy(&output.stdout));
        if keywords.contains_key(MDFILE) {
            Ok(Some(keywords))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let task = ProcessCutoutTask::new("/usr/local/bin/vocutout").with_staging_dir("/stage");
        let request = CutoutRequest {
            publisher_did: Some("ivo://a#t:1".to_string()),
            ra: Some(10.5),
            dec: Some(-3.0),
            width: Some(0.2),
            height: Some(0.2),
            wave_low: Some(5e-7),
            ..CutoutRequest::default()
        };
        let args = task.arguments("/data/img.fits", &request);
        assert_eq!(
            args,
            vec![
                "--metadata",
                "--pubdid=ivo://a#t:1",
                "--ra=10.5",
                "--dec=-3",
                "--width=0.2",
                "--height=0.2",
                "--wavelo=0.0000005",
                "--dir=/stage",
                "/data/img.fits",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_task_error() {
        let task = ProcessCutoutTask::new("/nonexistent/cutout-program");
        let err = task
            .compute("/data/img.fits", &CutoutRequest::default())
            .unwrap_err();
        assert!(matches!(err, DalError::ExternalTask(_)));
    }
}
