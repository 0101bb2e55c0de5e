//! Rule Templates
//!
//! The two fixed udev rule shapes: guests match SCSI disks by serial,
//! physical hosts match multipath maps by device-mapper name.

use crate::config::RuleOwnership;
use crate::domain::ports::{DiskgroupLabel, Platform};

/// Renders rule lines for one platform and host
#[derive(Debug, Clone)]
pub struct RuleTemplate {
    platform: Platform,
    hostname: String,
    link_dir: String,
    ownership: RuleOwnership,
}

impl RuleTemplate {
    /// The host name is upper-cased as it appears in link names
    pub fn new(
        platform: Platform,
        hostname: &str,
        link_dir: &str,
        ownership: RuleOwnership,
    ) -> Self {
        Self {
            platform,
            hostname: hostname.to_uppercase(),
            link_dir: link_dir.trim_end_matches('/').to_string(),
            ownership,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Symlink for a label, relative to /dev
    pub fn link_name(&self, label: &DiskgroupLabel) -> String {
        format!("{}/{}_{}", self.link_dir, self.hostname, label)
    }

    /// Rule line binding a stable identifier to a symlink
    pub fn render(&self, stable_id: &str, link: &str) -> String {
        let RuleOwnership { owner, group, mode } = &self.ownership;
        match self.platform {
            Platform::Virtualized => format!(
                r#"KERNEL=="sd*", BUS=="scsi", ENV{{ID_SERIAL}}=="{}", SYMLINK+="{}", OWNER="{}", GROUP="{}", MODE="{}""#,
                stable_id, link, owner, group, mode
            ),
            Platform::Physical => format!(
                r#"ACTION=="add|change", ENV{{DM_NAME}}=="{}", SYMLINK+="{}", OWNER="{}", GROUP="{}", MODE="{}""#,
                stable_id, link, owner, group, mode
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtualized_rule() {
        let template = RuleTemplate::new(
            Platform::Virtualized,
            "db01",
            "udevlinks",
            RuleOwnership::default(),
        );
        let link = template.link_name(&DiskgroupLabel::new("DATA01", 2));
        assert_eq!(link, "udevlinks/DB01_DATA01_2");
        assert_eq!(
            template.render("36000c29a1", &link),
            r#"KERNEL=="sd*", BUS=="scsi", ENV{ID_SERIAL}=="36000c29a1", SYMLINK+="udevlinks/DB01_DATA01_2", OWNER="oracle", GROUP="dba", MODE="0660""#
        );
    }

    #[test]
    fn test_physical_rule() {
        let ownership = RuleOwnership {
            owner: "grid".into(),
            group: "asmadmin".into(),
            mode: "0660".into(),
        };
        let template = RuleTemplate::new(Platform::Physical, "DB02", "asm/", ownership);
        let link = template.link_name(&DiskgroupLabel::new("REDO01", 1));
        assert_eq!(
            template.render("360060e8010", &link),
            r#"ACTION=="add|change", ENV{DM_NAME}=="360060e8010", SYMLINK+="asm/DB02_REDO01_1", OWNER="grid", GROUP="asmadmin", MODE="0660""#
        );
    }
}
