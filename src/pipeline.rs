//! Run Pipeline
//!
//! Drives one invocation end to end:
//!
//! ```text
//! PlatformDetector -> IdentityCorrelator -> CapacityPolicy [-> Grammar|Content]
//!                                                          -> RuleEmitter | map dump
//! ```
//!
//! All run-scoped state (correlation map, assignment, persisted rules) is
//! created here and dropped at the end of the run.

use crate::config::DiskmapConfig;
use crate::domain::ports::{
    DiskgroupAssignment, DiskgroupPolicy, Exclusion, ExclusionReason, Platform, ResolvedDevice,
    ToolRunner,
};
use crate::error::{Error, Result};
use crate::hardware::allocation::{is_link_component, CapacityPolicy, GrammarPolicy};
use crate::hardware::classification::ContentPolicy;
use crate::hardware::discovery::{CorrelationMap, IdentityCorrelator, PlatformDetector, ScanReport};
use crate::report;
use crate::rules::{EmitMode, EmitSummary, PersistedRules, RuleEmitter, RuleTemplate};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

// =============================================================================
// Run Options
// =============================================================================

/// Opt-in policy layered over the capacity baseline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PolicyChoice {
    /// Capacity baseline only
    #[default]
    Capacity,
    /// Operator grammar file
    Grammar(PathBuf),
    /// On-disk header inspection
    Content,
}

/// What the run prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Rule lines
    Rules(EmitMode),
    /// Persisted-rule table, as JSON when set
    MapDump { json: bool },
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Rules(EmitMode::Full)
    }
}

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: PolicyChoice,
    pub output: OutputMode,
    /// Host name used in link names
    pub hostname: String,
    /// Timestamp written into the rules header
    pub generated_at: DateTime<Utc>,
}

impl RunOptions {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            policy: PolicyChoice::default(),
            output: OutputMode::default(),
            hostname: hostname.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Host name from the configuration, falling back to the system's
pub fn resolve_hostname(config: &DiskmapConfig) -> Result<String> {
    if let Some(name) = config.hostname.as_deref().filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    let name = hostname::get()?
        .into_string()
        .map_err(|raw| Error::Configuration(format!("host name is not valid UTF-8: {:?}", raw)))?;
    if !is_link_component(&name) {
        return Err(Error::Configuration(format!("Invalid hostname: {:?}", name)));
    }
    Ok(name)
}

// =============================================================================
// Run Summary
// =============================================================================

/// Result of discovery: the platform and its canonical devices
#[derive(Debug, Clone)]
pub struct Discovery {
    pub platform: Platform,
    pub map: CorrelationMap,
    pub reports: Vec<ScanReport>,
    pub devices: Vec<ResolvedDevice>,
    pub exclusions: Vec<Exclusion>,
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub platform: Platform,
    pub canonical: usize,
    /// Devices dropped during correlation or allocation
    pub exclusions: Vec<Exclusion>,
    /// Present for rule runs
    pub emit: Option<EmitSummary>,
    /// Present for map dumps
    pub map_rows: Option<usize>,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs the stages in order against one host
pub struct Pipeline<'a> {
    runner: &'a dyn ToolRunner,
    config: &'a DiskmapConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn ToolRunner, config: &'a DiskmapConfig) -> Self {
        Self { runner, config }
    }

    /// Detect the platform and correlate its canonical devices
    pub fn discover(&self) -> Result<Discovery> {
        let platform = PlatformDetector::new(
            self.runner,
            &self.config.tools.lspci,
            &self.config.hypervisor_signature,
        )
        .detect()?;

        let correlation = IdentityCorrelator::new(self.runner, self.config).correlate(platform)?;
        let canonical = correlation.map.canonical_devices(platform);
        info!(
            "{} canonical devices on {} host ({} excluded)",
            canonical.devices.len(),
            platform,
            canonical.exclusions.len()
        );

        Ok(Discovery {
            platform,
            map: correlation.map,
            reports: correlation.reports,
            devices: canonical.devices,
            exclusions: canonical.exclusions,
        })
    }

    /// Capacity baseline, then the opt-in policy on top
    pub fn allocate(
        &self,
        discovery: &Discovery,
        choice: &PolicyChoice,
    ) -> Result<(DiskgroupAssignment, Vec<Exclusion>)> {
        let mut assignment = DiskgroupAssignment::new();
        let mut exclusions = Vec::new();

        let profile = self.config.profile(discovery.platform);
        let baseline = CapacityPolicy::new(profile);
        exclusions.extend(self.apply(&baseline, &discovery.devices, &mut assignment)?);

        match choice {
            PolicyChoice::Capacity => {}
            PolicyChoice::Grammar(path) => {
                let grammar = GrammarPolicy::load(path)?;
                exclusions.extend(self.apply(&grammar, &discovery.devices, &mut assignment)?);
            }
            PolicyChoice::Content => {
                let content = ContentPolicy::new(
                    self.runner,
                    &self.config.tools.od,
                    &self.config.content_reserved,
                );
                exclusions.extend(self.apply(&content, &discovery.devices, &mut assignment)?);
            }
        }

        Ok((assignment, exclusions))
    }

    fn apply(
        &self,
        policy: &dyn DiskgroupPolicy,
        devices: &[ResolvedDevice],
        assignment: &mut DiskgroupAssignment,
    ) -> Result<Vec<Exclusion>> {
        let outcome = policy.assign(devices, assignment)?;
        debug!(
            "{} policy assigned {} devices",
            policy.name(),
            outcome.assigned.len()
        );
        Ok(outcome.exclusions)
    }

    /// Execute one invocation, writing rules or the map table to `out`
    pub fn run<W: Write>(&self, options: &RunOptions, out: &mut W) -> Result<RunSummary> {
        let discovery = self.discover()?;
        let mut exclusions = discovery.exclusions.clone();

        let summary = match options.output {
            OutputMode::MapDump { json } => {
                let persisted = PersistedRules::load_existing(&self.config.rules_path)?;
                let rows = report::map_rows(&persisted, &discovery.map);
                if json {
                    report::write_json(out, &rows)?;
                } else {
                    report::write_table(out, &rows)?;
                }
                RunSummary {
                    platform: discovery.platform,
                    canonical: discovery.devices.len(),
                    exclusions,
                    emit: None,
                    map_rows: Some(rows.len()),
                }
            }
            OutputMode::Rules(mode) => {
                let (assignment, allocation_exclusions) =
                    self.allocate(&discovery, &options.policy)?;
                exclusions.extend(allocation_exclusions);

                let persisted = match mode {
                    EmitMode::Delta => PersistedRules::load_existing(&self.config.rules_path)?,
                    EmitMode::Full => PersistedRules::new(),
                };

                let template = RuleTemplate::new(
                    discovery.platform,
                    &options.hostname,
                    &self.config.link_dir,
                    self.config.ownership.clone(),
                );
                let emitter = RuleEmitter::new(&template);
                emitter.write_header(out, options.generated_at)?;
                let emit =
                    emitter.emit(out, &discovery.devices, &assignment, &persisted, mode)?;
                exclusions.extend(
                    emit.unassigned
                        .iter()
                        .map(|name| Exclusion::new(name.as_str(), ExclusionReason::Unassigned)),
                );

                RunSummary {
                    platform: discovery.platform,
                    canonical: discovery.devices.len(),
                    exclusions,
                    emit: Some(emit),
                    map_rows: None,
                }
            }
        };

        for exclusion in &summary.exclusions {
            warn!("Excluded {}: {}", exclusion.kernel_name, exclusion.reason);
        }
        out.flush()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use indoc::indoc;
    use tempfile::NamedTempFile;

    const GUEST_PARTITIONS: &str = indoc! {"
        major minor  #blocks  name

           8        0   41943040 sda
           8       16   10485760 sdb
           8       32   10485760 sdc
           8       48    1048576 sdd
           8       64   10485760 sde
           8       80   52428800 sdf
          11        0    1048575 sr0
    "};

    const GUEST_TOPOLOGY: &str = indoc! {"
        /dev/sg0  0 0 0 0  0  /dev/sda
        /dev/sg1  0 0 1 0  0  /dev/sdb
        /dev/sg2  0 0 2 0  0  /dev/sdc
        /dev/sg3  0 0 3 0  0  /dev/sdd
        /dev/sg4  0 0 4 0  0  /dev/sde
        /dev/sg5  0 0 5 0  0  /dev/sdf
        /dev/sg6  2 0 0 0  5  /dev/sr0
    "};

    const HOST_PARTITIONS: &str = indoc! {"
        major minor  #blocks  name

           8        0   41943040 sda
         253        0    1048576 dm-0
         253        1   16777920 dm-1
         253        2  134218560 dm-2
    "};

    const HOST_MULTIPATH: &str = indoc! {"
        360060e80166d3c0000016d3c00000010\t(dm-0)
        360060e80166d3c0000016d3c00000011\t(dm-1)
        360060e80166d3c0000016d3c00000012\t(dm-2)
    "};

    fn partitions(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn config(partitions: &NamedTempFile, rules: PathBuf) -> DiskmapConfig {
        DiskmapConfig {
            partitions_path: partitions.path().to_path_buf(),
            rules_path: rules,
            ..DiskmapConfig::default()
        }
    }

    fn guest_runner(config: &DiskmapConfig) -> FakeRunner {
        let mut runner = FakeRunner::new()
            .with_output(
                &config.tools.lspci,
                vec![],
                "00:0f.0 VGA compatible controller: VMware SVGA II Adapter\n",
            )
            .with_output(&config.tools.sg_map, vec!["-x".into()], GUEST_TOPOLOGY);
        for name in ["sda", "sdb", "sdc", "sdd", "sde", "sdf"] {
            runner = runner.with_output(
                &config.tools.scsi_id,
                vec!["-g".into(), "-u".into(), "-d".into(), format!("/dev/{}", name)],
                &format!("36000c29{}\n", name),
            );
        }
        runner
    }

    fn host_runner(config: &DiskmapConfig) -> FakeRunner {
        FakeRunner::new()
            .with_output(
                &config.tools.lspci,
                vec![],
                "00:1f.2 SATA controller: Intel Corporation\n",
            )
            .with_output(
                &config.tools.dmsetup,
                vec!["ls".into(), "-o".into(), "blkdevname".into()],
                HOST_MULTIPATH,
            )
            .with_output(
                &config.tools.sg_map,
                vec!["-x".into()],
                "/dev/sg0  0 0 0 0  0  /dev/sda\n",
            )
            .with_any_args(&config.tools.scsi_id, "3600508b1001c0000\n")
    }

    fn options(output: OutputMode, policy: PolicyChoice) -> RunOptions {
        RunOptions {
            policy,
            output,
            hostname: "db01".to_string(),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn run(
        config: &DiskmapConfig,
        runner: &FakeRunner,
        options: &RunOptions,
    ) -> (String, RunSummary) {
        let mut out = Vec::new();
        let summary = Pipeline::new(runner, config).run(options, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_guest_run_emits_serial_rules() {
        let file = partitions(GUEST_PARTITIONS);
        let config = config(&file, "/nonexistent/99-asmdisk.rules".into());
        let runner = guest_runner(&config);

        let options = options(OutputMode::default(), PolicyChoice::Capacity);
        let (text, summary) = run(&config, &runner, &options);

        assert_eq!(summary.platform, Platform::Virtualized);
        assert_eq!(summary.canonical, 6);
        assert!(text.starts_with("# diskmap "));
        assert!(text.contains(
            r#"ENV{ID_SERIAL}=="36000c29sdd", SYMLINK+="udevlinks/DB01_ORAC01_1""#
        ));
        assert!(text.contains(
            r#"ENV{ID_SERIAL}=="36000c29sde", SYMLINK+="udevlinks/DB01_TEMP01_1""#
        ));
        assert!(text.contains(
            r#"ENV{ID_SERIAL}=="36000c29sdf", SYMLINK+="udevlinks/DB01_DATA01_1""#
        ));
        assert!(!text.contains("36000c29sda"));

        let emit = summary.emit.unwrap();
        assert_eq!(emit.emitted, 3);
        let reserved = summary
            .exclusions
            .iter()
            .filter(|e| e.reason == ExclusionReason::Reserved)
            .count();
        assert_eq!(reserved, 3);
    }

    #[test]
    fn test_physical_host_uses_device_mapper_template() {
        let file = partitions(HOST_PARTITIONS);
        let config = config(&file, "/nonexistent/99-asmdisk.rules".into());
        let runner = host_runner(&config);

        let options = options(OutputMode::default(), PolicyChoice::Capacity);
        let (text, summary) = run(&config, &runner, &options);

        assert_eq!(summary.platform, Platform::Physical);
        assert_eq!(summary.canonical, 3);
        assert!(text.contains("(physical)"));
        assert!(text.contains(
            r#"ACTION=="add|change", ENV{DM_NAME}=="360060e80166d3c0000016d3c00000010", SYMLINK+="udevlinks/DB01_ORAC01_1""#
        ));
        assert!(text.contains(r#"SYMLINK+="udevlinks/DB01_REDO01_1""#));
        assert!(text.contains(r#"SYMLINK+="udevlinks/DB01_TEMP01_1""#));
        assert!(!text.contains("ID_SERIAL"));
    }

    #[test]
    fn test_delta_skips_persisted_identifiers() {
        let file = partitions(GUEST_PARTITIONS);
        let mut rules = NamedTempFile::new().unwrap();
        writeln!(
            rules,
            r#"KERNEL=="sd*", BUS=="scsi", ENV{{ID_SERIAL}}=="36000c29sdd", SYMLINK+="udevlinks/DB01_ORAC01_1", OWNER="oracle", GROUP="dba", MODE="0660""#
        )
        .unwrap();
        let config = config(&file, rules.path().to_path_buf());
        let runner = guest_runner(&config);

        let (text, summary) = run(
            &config,
            &runner,
            &options(OutputMode::Rules(EmitMode::Delta), PolicyChoice::Capacity),
        );

        assert!(!text.contains("36000c29sdd"));
        let emit = summary.emit.unwrap();
        assert_eq!(emit.emitted, 2);
        assert_eq!(emit.suppressed, 1);
    }

    #[test]
    fn test_grammar_overrides_baseline() {
        let file = partitions(GUEST_PARTITIONS);
        let config = config(&file, "/nonexistent/99-asmdisk.rules".into());
        let runner = guest_runner(&config);
        let mut grammar = NamedTempFile::new().unwrap();
        grammar.write_all(b"sdd datadisk\nsde datadisk\nsdz datadisk\n").unwrap();

        let (text, summary) = run(
            &config,
            &runner,
            &options(OutputMode::default(), PolicyChoice::Grammar(grammar.path().to_path_buf())),
        );

        assert!(text.contains(r#"SYMLINK+="udevlinks/DB01_datadisk_1""#));
        assert!(text.contains(r#"SYMLINK+="udevlinks/DB01_datadisk_2""#));
        // sdf keeps its baseline label
        assert!(text.contains(r#"SYMLINK+="udevlinks/DB01_DATA01_1""#));
        assert!(summary
            .exclusions
            .iter()
            .any(|e| e.kernel_name == "sdz" && e.reason == ExclusionReason::UnknownDevice));
    }

    #[test]
    fn test_missing_grammar_file_is_fatal() {
        let file = partitions(GUEST_PARTITIONS);
        let config = config(&file, "/nonexistent/99-asmdisk.rules".into());
        let runner = guest_runner(&config);

        let mut out = Vec::new();
        let err = Pipeline::new(&runner, &config)
            .run(
                &options(
                    OutputMode::default(),
                    PolicyChoice::Grammar("/nonexistent/grammar".into()),
                ),
                &mut out,
            )
            .unwrap_err();
        assert_matches!(err, Error::GrammarFile { .. });
        assert!(out.is_empty());
    }

    #[test]
    fn test_map_dump_skips_allocation() {
        let file = partitions(GUEST_PARTITIONS);
        let mut rules = NamedTempFile::new().unwrap();
        writeln!(
            rules,
            r#"KERNEL=="sd*", ENV{{ID_SERIAL}}=="36000c29sdf", SYMLINK+="udevlinks/DB01_DATA01_1""#
        )
        .unwrap();
        let config = config(&file, rules.path().to_path_buf());
        let runner = guest_runner(&config);

        let (text, summary) = run(
            &config,
            &runner,
            &options(OutputMode::MapDump { json: false }, PolicyChoice::Content),
        );

        assert_eq!(summary.map_rows, Some(1));
        assert!(summary.emit.is_none());
        assert!(text.contains("36000c29sdf"));
        assert!(text.contains("50.00 GiB"));
        assert!(runner.calls().iter().all(|(program, _)| program != &config.tools.od));
    }

    #[test]
    fn test_missing_lspci_aborts() {
        let file = partitions(GUEST_PARTITIONS);
        let config = config(&file, "/nonexistent/99-asmdisk.rules".into());
        let runner = FakeRunner::new();

        let mut out = Vec::new();
        let err = Pipeline::new(&runner, &config)
            .run(&options(OutputMode::default(), PolicyChoice::Capacity), &mut out)
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_configured_hostname_wins() {
        let config = DiskmapConfig {
            hostname: Some("db07".to_string()),
            ..DiskmapConfig::default()
        };
        assert_eq!(resolve_hostname(&config).unwrap(), "db07");
    }
}
