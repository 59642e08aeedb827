//! Workflow-run log archive extraction.
//!
//! The code host serves run logs as a zip archive: one top-level directory
//! per job, each holding numbered per-step text files. Entries are grouped
//! by that top-level directory and concatenated in name order; files sitting
//! at the archive root become their own job named by file stem.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::HostResult;

/// One job's concatenated log text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub job: String,
    pub text: String,
}

/// Extract per-job logs from a run-log zip archive.
pub fn extract_job_logs(bytes: &[u8]) -> HostResult<Vec<JobLog>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    // name -> (entry name, content), BTreeMap keeps step files in name order
    let mut jobs: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut content = String::new();
        entry.read_to_string(&mut content)?;

        let job = match name.split_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => name.trim_end_matches(".txt").to_string(),
        };

        jobs.entry(job).or_default().insert(name, content);
    }

    Ok(jobs
        .into_iter()
        .map(|(job, entries)| JobLog {
            job,
            text: entries.into_values().collect::<Vec<_>>().join("\n"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_groups_by_top_level_directory() {
        let bytes = build_archive(&[
            ("build/1_setup.txt", "setup output"),
            ("build/2_compile.txt", "compile output"),
            ("test/1_pytest.txt", "FAILED tests/test_x.py"),
        ]);

        let logs = extract_job_logs(&bytes).unwrap();
        assert_eq!(logs.len(), 2);

        let build = logs.iter().find(|l| l.job == "build").unwrap();
        assert!(build.text.contains("setup output"));
        assert!(build.text.contains("compile output"));
        // Step order preserved
        assert!(build.text.find("setup").unwrap() < build.text.find("compile").unwrap());

        let test = logs.iter().find(|l| l.job == "test").unwrap();
        assert!(test.text.contains("FAILED"));
    }

    #[test]
    fn test_root_files_become_their_own_job() {
        let bytes = build_archive(&[("0_lint.txt", "ruff output")]);

        let logs = extract_job_logs(&bytes).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].job, "0_lint");
        assert_eq!(logs[0].text, "ruff output");
    }

    #[test]
    fn test_empty_archive() {
        let bytes = build_archive(&[]);
        let logs = extract_job_logs(&bytes).unwrap();
        assert!(logs.is_empty());
    }
}
