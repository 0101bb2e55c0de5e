//! Map Dump Report
//!
//! Joins the persisted rules with the current correlation map so an
//! operator can see which device and size each persisted link points at.

use crate::error::Result;
use crate::hardware::discovery::CorrelationMap;
use crate::rules::PersistedRules;
use serde::Serialize;
use std::io::Write;

const KIB_PER_GIB: f64 = 1024.0 * 1024.0;

/// One persisted rule resolved against the current host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapRow {
    pub stable_id: String,
    /// Current kernel (or dm) name, if the identifier is present
    pub device: Option<String>,
    pub size_kib: Option<u64>,
    /// Persisted symlink name
    pub link: String,
}

impl MapRow {
    fn size_display(&self) -> String {
        let kib = self.size_kib.unwrap_or(0);
        format!("{:.2} GiB", kib as f64 / KIB_PER_GIB)
    }
}

/// Resolve every persisted rule against the map
pub fn map_rows(persisted: &PersistedRules, map: &CorrelationMap) -> Vec<MapRow> {
    persisted
        .iter()
        .map(|(stable_id, link)| {
            let identity = map.kernel_for_stable(stable_id).map(|d| map.identity(d));
            MapRow {
                stable_id: stable_id.to_string(),
                size_kib: identity.as_ref().and_then(|i| i.size_kib),
                device: identity.map(|i| i.kernel_name),
                link: link.to_string(),
            }
        })
        .collect()
}

/// Fixed-width table; unknown devices show as `unk`
pub fn write_table<W: Write>(out: &mut W, rows: &[MapRow]) -> Result<()> {
    writeln!(out, "{:<35} {:<6} {:<10} {}", "UUID", "Dev", "Size", "Diskgroup")?;
    for row in rows {
        writeln!(
            out,
            "{:<35} {:<6} {:<10} {}",
            row.stable_id,
            row.device.as_deref().unwrap_or("unk"),
            row.size_display(),
            row.link
        )?;
    }
    Ok(())
}

/// Rows as a pretty JSON array
pub fn write_json<W: Write>(out: &mut W, rows: &[MapRow]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, rows)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (PersistedRules, CorrelationMap) {
        let persisted = PersistedRules::parse(concat!(
            r#"KERNEL=="sd*", ENV{ID_SERIAL}=="36000c29d", SYMLINK+="udevlinks/DB01_DATA01_1""#,
            "\n",
            r#"KERNEL=="sd*", ENV{ID_SERIAL}=="36000c29gone", SYMLINK+="udevlinks/DB01_DATA01_2""#,
            "\n",
        ));

        let mut map = CorrelationMap::new();
        map.ingest_partitions("   8   48   10485760 sdd\n");
        map.ingest_topology("/dev/sg3  0 0 3 0  0  /dev/sdd\n", |_| {
            Ok(Some("36000c29d".to_string()))
        })
        .unwrap();
        (persisted, map)
    }

    #[test]
    fn test_rows_resolve_current_devices() {
        let (persisted, map) = fixture();
        let rows = map_rows(&persisted, &map);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device.as_deref(), Some("sdd"));
        assert_eq!(rows[0].size_kib, Some(10_485_760));
        assert_eq!(rows[1].device, None);
        assert_eq!(rows[1].size_kib, None);
    }

    #[test]
    fn test_table_format() {
        let (persisted, map) = fixture();
        let mut out = Vec::new();
        write_table(&mut out, &map_rows(&persisted, &map)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("UUID"));
        assert!(lines[1].contains("sdd    10.00 GiB  udevlinks/DB01_DATA01_1"));
        assert!(lines[2].contains("unk    0.00 GiB   udevlinks/DB01_DATA01_2"));
    }

    #[test]
    fn test_json_output() {
        let (persisted, map) = fixture();
        let mut out = Vec::new();
        write_json(&mut out, &map_rows(&persisted, &map)).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["device"], "sdd");
        assert_eq!(value[1]["device"], serde_json::Value::Null);
        assert_eq!(value[1]["link"], "udevlinks/DB01_DATA01_2");
    }
}
