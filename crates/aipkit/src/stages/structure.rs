//! Sorts the top level of an AIP into `objects` and `metadata`.

use log::debug;

use crate::config::MetadataPrefixRule;
use crate::pipeline::context::Aip;
use crate::pipeline::error::{ErrorCategory, Halt, StepResult};
use crate::pipeline::log::LogField;
use crate::storage::filesystem::{create_new_directory, list_names, move_path};

pub const OBJECTS: &str = "objects";
pub const METADATA: &str = "metadata";

pub const OBJECTS_CREATED: &str = "Successfully created objects folder";
pub const OBJECTS_EXISTS: &str = "Objects folder already exists in original files";
pub const METADATA_CREATED: &str = "Successfully created metadata folder";
pub const METADATA_EXISTS: &str = "Metadata folder already exists in original files";

const WEB_CRAWL_SUFFIXES: [&str; 6] = [
    "_seed.csv",
    "_seedscope.csv",
    "_collscope.csv",
    "_coll.csv",
    "_crawldef.csv",
    "_crawljob.csv",
];

/// A reason for a top-level entry to belong in `metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRule {
    /// The scrubber's deletion log for this AIP.
    DeletionLog,
    /// Files a department names with a fixed prefix.
    DepartmentPrefix { department: String, prefix: String },
    /// Web crawl reports, for the web archive department or any `-web-` AIP.
    WebCrawl { department: String },
}

impl MetadataRule {
    pub fn matches(&self, aip: &Aip, name: &str) -> bool {
        match self {
            Self::DeletionLog => {
                name.starts_with(&format!("{}_files-deleted_", aip.id)) && name.ends_with("_del.csv")
            }
            Self::DepartmentPrefix { department, prefix } => {
                &aip.department == department && name.starts_with(prefix.as_str())
            }
            Self::WebCrawl { department } => {
                (&aip.department == department || aip.id.contains("-web-"))
                    && WEB_CRAWL_SUFFIXES.iter().any(|s| name.ends_with(s))
            }
        }
    }
}

/// Built-in rules, most specific first, followed by configured prefixes.
pub fn metadata_rules(extra: &[MetadataPrefixRule]) -> Vec<MetadataRule> {
    let mut rules = vec![
        MetadataRule::DeletionLog,
        MetadataRule::DepartmentPrefix {
            department: "emory".to_string(),
            prefix: "EmoryMD".to_string(),
        },
        MetadataRule::WebCrawl {
            department: "magil".to_string(),
        },
    ];
    for rule in extra {
        let rule = MetadataRule::DepartmentPrefix {
            department: rule.department.clone(),
            prefix: rule.prefix.clone(),
        };
        if !rules.contains(&rule) {
            rules.push(rule);
        }
    }
    rules
}

pub fn is_metadata(aip: &Aip, name: &str, rules: &[MetadataRule]) -> bool {
    rules.iter().any(|rule| rule.matches(aip, name))
}

pub fn structure_directory(aip: &mut Aip, rules: &[MetadataRule]) -> StepResult {
    let objects = aip.objects_dir();
    let metadata = aip.metadata_dir();

    if std::fs::symlink_metadata(&objects).is_ok() {
        return Err(Halt::quarantine(ErrorCategory::ObjectsFolderExists, OBJECTS_EXISTS));
    }
    create_new_directory(&objects)?;
    aip.log.record(LogField::ObjectsFolder, OBJECTS_CREATED);

    if std::fs::symlink_metadata(&metadata).is_ok() {
        return Err(
            Halt::quarantine(ErrorCategory::MetadataFolderExists, METADATA_EXISTS)
                .in_field(LogField::MetadataFolder),
        );
    }
    create_new_directory(&metadata)?;
    aip.log.record(LogField::MetadataFolder, METADATA_CREATED);

    for name in list_names(&aip.directory)? {
        if name == OBJECTS || name == METADATA {
            continue;
        }
        let destination = if is_metadata(aip, &name.to_string_lossy(), rules) {
            &metadata
        } else {
            &objects
        };
        move_path(&aip.directory.join(&name), &destination.join(&name))?;
        debug!("Moved {:?} into {}", name, destination.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::sheet::SheetRow;
    use std::path::Path;
    use tempfile::TempDir;

    fn aip_for(batch: &Path, department: &str, id: &str) -> Aip {
        let row = SheetRow {
            department: department.to_string(),
            collection: "c".to_string(),
            folder: id.to_string(),
            aip_id: id.to_string(),
            title: "T".to_string(),
            version: 1,
            zip: None,
        };
        let aip = Aip::from_row(&row, batch, true);
        std::fs::create_dir_all(&aip.directory).unwrap();
        aip
    }

    fn touch(aip: &Aip, name: &str) {
        std::fs::write(aip.directory.join(name), b"x").unwrap();
    }

    #[test]
    fn test_structure_sorts_entries() {
        let tmp = TempDir::new().unwrap();
        let mut aip = aip_for(tmp.path(), "emory", "emory-ms1-001");
        touch(&aip, "report.pdf");
        touch(&aip, "EmoryMD_desc.xml");
        touch(&aip, "emory-ms1-001_files-deleted_2024-01-01_del.csv");
        std::fs::create_dir_all(aip.directory.join("photos/2001")).unwrap();
        touch(&aip, "photos/2001/a.jpg");

        structure_directory(&mut aip, &metadata_rules(&[])).unwrap();

        assert_eq!(list_names(&aip.directory).unwrap(), vec!["metadata", "objects"]);
        assert_eq!(
            list_names(&aip.metadata_dir()).unwrap(),
            vec!["EmoryMD_desc.xml", "emory-ms1-001_files-deleted_2024-01-01_del.csv"]
        );
        assert_eq!(list_names(&aip.objects_dir()).unwrap(), vec!["photos", "report.pdf"]);
        assert!(aip.objects_dir().join("photos/2001/a.jpg").is_file());
        assert_eq!(aip.log.get(LogField::ObjectsFolder), OBJECTS_CREATED);
        assert_eq!(aip.log.get(LogField::MetadataFolder), METADATA_CREATED);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_moved() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let mut aip = aip_for(tmp.path(), "hargrett", "har-001");
        let name = std::ffi::OsStr::from_bytes(b"caf\xe9.txt");
        std::fs::write(aip.directory.join(name), b"x").unwrap();

        structure_directory(&mut aip, &metadata_rules(&[])).unwrap();

        assert!(aip.objects_dir().join(name).is_file());
    }

    #[test]
    fn test_prefix_rule_is_department_specific() {
        let tmp = TempDir::new().unwrap();
        let mut aip = aip_for(tmp.path(), "hargrett", "har-ms1-001");
        touch(&aip, "EmoryMD_desc.xml");

        structure_directory(&mut aip, &metadata_rules(&[])).unwrap();

        assert!(aip.objects_dir().join("EmoryMD_desc.xml").is_file());
    }

    #[test]
    fn test_web_crawl_rules() {
        let tmp = TempDir::new().unwrap();
        let rules = metadata_rules(&[]);

        let magil = aip_for(tmp.path(), "magil", "magil-ggp-001");
        assert!(is_metadata(&magil, "x_seed.csv", &rules));
        assert!(is_metadata(&magil, "x_crawljob.csv", &rules));
        assert!(!is_metadata(&magil, "x_seeds.csv", &rules));

        let web = aip_for(tmp.path(), "hargrett", "har-ua-web-001");
        assert!(is_metadata(&web, "x_collscope.csv", &rules));

        let plain = aip_for(tmp.path(), "hargrett", "har-ua-001");
        assert!(!is_metadata(&plain, "x_seed.csv", &rules));
    }

    #[test]
    fn test_configured_prefix_rule() {
        let tmp = TempDir::new().unwrap();
        let rules = metadata_rules(&[MetadataPrefixRule {
            department: "russell".to_string(),
            prefix: "RBRL_".to_string(),
        }]);
        let aip = aip_for(tmp.path(), "russell", "rbrl-001");

        assert!(is_metadata(&aip, "RBRL_finding_aid.pdf", &rules));
        assert!(!is_metadata(&aip, "finding_aid.pdf", &rules));
    }

    #[test]
    fn test_deletion_log_must_belong_to_this_aip() {
        let tmp = TempDir::new().unwrap();
        let rules = metadata_rules(&[]);
        let aip = aip_for(tmp.path(), "hargrett", "har-001");

        assert!(is_metadata(&aip, "har-001_files-deleted_2024-01-01_del.csv", &rules));
        assert!(!is_metadata(&aip, "har-002_files-deleted_2024-01-01_del.csv", &rules));
    }

    #[test]
    fn test_existing_objects_folder_quarantines() {
        let tmp = TempDir::new().unwrap();
        let mut aip = aip_for(tmp.path(), "hargrett", "har-001");
        std::fs::create_dir(aip.directory.join("objects")).unwrap();
        touch(&aip, "file.txt");

        match structure_directory(&mut aip, &metadata_rules(&[])) {
            Err(Halt::Quarantine(q)) => {
                assert_eq!(q.category, ErrorCategory::ObjectsFolderExists);
                assert_eq!(q.message, OBJECTS_EXISTS);
                assert_eq!(q.field, None);
            }
            other => panic!("Expected quarantine, got {:?}", other),
        }
        assert!(aip.directory.join("file.txt").is_file());
    }

    #[test]
    fn test_existing_metadata_folder_quarantines() {
        let tmp = TempDir::new().unwrap();
        let mut aip = aip_for(tmp.path(), "hargrett", "har-001");
        std::fs::create_dir(aip.directory.join("metadata")).unwrap();

        match structure_directory(&mut aip, &metadata_rules(&[])) {
            Err(Halt::Quarantine(q)) => {
                assert_eq!(q.category, ErrorCategory::MetadataFolderExists);
                assert_eq!(q.field, Some(LogField::MetadataFolder));
            }
            other => panic!("Expected quarantine, got {:?}", other),
        }
        assert_eq!(aip.log.get(LogField::ObjectsFolder), OBJECTS_CREATED);
    }
}
