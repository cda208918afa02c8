use std::path::Path;
use std::time::Duration;

use crate::platform::run_command;
use crate::scan::ports::{DiskUsage, DiskUsageError};

/// Sizes entries with `du -sk`.
#[derive(Debug, Clone, Copy)]
pub struct DuCommand {
    pub timeout: Duration,
}

impl DuCommand {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl DiskUsage for DuCommand {
    fn size_in_kb(&self, path: &Path) -> Result<u64, DiskUsageError> {
        let path_s = path.display().to_string();
        let out = run_command("du", &["-sk", path_s.as_str()], self.timeout)?;
        if out.exit_code != 0 {
            return Err(classify_failure(&path_s, out.exit_code, &out.stderr));
        }
        parse_du_kb(&out.stdout)
    }
}

fn classify_failure(path: &str, exit_code: i32, stderr: &str) -> DiskUsageError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("permission denied") || lower.contains("operation not permitted") {
        return DiskUsageError::PermissionDenied {
            path: path.to_string(),
        };
    }
    if lower.contains("no such file") {
        return DiskUsageError::NotFound {
            path: path.to_string(),
        };
    }
    DiskUsageError::Failed {
        exit_code,
        stderr: stderr.trim().to_string(),
    }
}

fn parse_du_kb(stdout: &str) -> Result<u64, DiskUsageError> {
    stdout
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| DiskUsageError::Unparsable(stdout.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_du_output() {
        assert_eq!(parse_du_kb("1234\t/Users/me/Library/Caches\n").unwrap(), 1234);
        assert!(matches!(
            parse_du_kb(""),
            Err(DiskUsageError::Unparsable(_))
        ));
    }

    #[test]
    fn classify_du_failures() {
        assert!(matches!(
            classify_failure("/x", 1, "du: /x/y: Permission denied"),
            DiskUsageError::PermissionDenied { .. }
        ));
        assert!(matches!(
            classify_failure("/x", 1, "du: /x: No such file or directory"),
            DiskUsageError::NotFound { .. }
        ));
        assert!(matches!(
            classify_failure("/x", 2, "boom"),
            DiskUsageError::Failed { exit_code: 2, .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn du_measures_a_real_directory() {
        let dir = std::env::temp_dir().join(format!("macsweep-du-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(dir.join("blob.bin"), vec![7u8; 64 * 1024]).expect("write");

        let du = DuCommand::new(Duration::from_secs(10));
        let kb = du.size_in_kb(&dir).expect("du");
        assert!(kb > 0);

        let missing = du.size_in_kb(&dir.join("missing"));
        assert!(missing.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
