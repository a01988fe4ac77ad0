use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

const DEFAULT_JAVA: &str = "java-1.8.0-openjdk-headless";
const DEFAULT_JAVA_BIN: &str = "/usr/bin/java";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Amazon,
    Fedora,
    El,
    Redhatfips,
    Sles,
    Debian,
    Ubuntu,
}

impl OsFamily {
    pub const ALL: [OsFamily; 7] = [
        OsFamily::Amazon,
        OsFamily::Fedora,
        OsFamily::El,
        OsFamily::Redhatfips,
        OsFamily::Sles,
        OsFamily::Debian,
        OsFamily::Ubuntu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Amazon => "amazon",
            OsFamily::Fedora => "fedora",
            OsFamily::El => "el",
            OsFamily::Redhatfips => "redhatfips",
            OsFamily::Sles => "sles",
            OsFamily::Debian => "debian",
            OsFamily::Ubuntu => "ubuntu",
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        match self {
            OsFamily::Amazon
            | OsFamily::Fedora
            | OsFamily::El
            | OsFamily::Redhatfips
            | OsFamily::Sles => OutputFormat::Rpm,
            OsFamily::Debian | OsFamily::Ubuntu => OutputFormat::Deb,
        }
    }

    /// Directories packaged when no `--source` list is given.
    pub fn default_sources(&self) -> &'static [&'static str] {
        match self.output_format() {
            OutputFormat::Rpm => &["etc", "opt", "usr", "var"],
            OutputFormat::Deb => &["etc", "lib", "opt", "var"],
        }
    }

    /// Tag used when `--dist` is not given, e.g. `el8`.
    pub fn dist_tag(&self, os_version: Option<u32>) -> String {
        match os_version {
            Some(version) => format!("{}{version}", self.as_str()),
            None => self.as_str().to_string(),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Rpm,
    Deb,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Rpm => "rpm",
            OutputFormat::Deb => "deb",
        }
    }

    /// Debian builds are keyed on the dist tag alone.
    pub fn requires_os_version(&self) -> bool {
        matches!(self, OutputFormat::Rpm)
    }

    pub fn script_dir(&self) -> &'static str {
        match self {
            OutputFormat::Rpm => "ext/redhat",
            OutputFormat::Deb => "ext/debian",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime facts that differ between operating system families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub java: &'static str,
    pub java_bin: &'static str,
    pub systemd_el: bool,
    pub systemd_sles: bool,
    pub sles: bool,
    pub extra_depends: Vec<&'static str>,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            java: DEFAULT_JAVA,
            java_bin: DEFAULT_JAVA_BIN,
            systemd_el: false,
            systemd_sles: false,
            sles: false,
            extra_depends: Vec::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Unrecognized el os version {0}")]
    UnsupportedElVersion(u32),
    #[error("--os-version is required for {0}")]
    MissingOsVersion(OsFamily),
}

pub fn platform_profile(
    family: OsFamily,
    os_version: Option<u32>,
) -> Result<PlatformProfile, PlatformError> {
    let base = PlatformProfile::default();

    let profile = match family {
        OsFamily::Fedora | OsFamily::Redhatfips => PlatformProfile {
            systemd_el: true,
            ..base
        },
        OsFamily::Amazon => PlatformProfile {
            java: "(java-17-amazon-corretto-headless or java-11-amazon-corretto-headless)",
            systemd_el: true,
            extra_depends: vec!["tzdata-java"],
            ..base
        },
        OsFamily::El => {
            let version = os_version.ok_or(PlatformError::MissingOsVersion(family))?;
            let (java, java_bin) = match version {
                7 => ("jre-11-headless", "/usr/lib/jvm/jre-11/bin/java"),
                v if v >= 8 => ("jre-17-headless", "/usr/lib/jvm/jre-17/bin/java"),
                other => return Err(PlatformError::UnsupportedElVersion(other)),
            };
            PlatformProfile {
                java,
                java_bin,
                systemd_el: true,
                ..base
            }
        }
        OsFamily::Sles => PlatformProfile {
            java: "java-11-openjdk-headless",
            systemd_sles: true,
            sles: true,
            ..base
        },
        OsFamily::Debian | OsFamily::Ubuntu => PlatformProfile {
            java: "openjdk-17-jre-headless | openjdk-11-jre-headless",
            ..base
        },
    };

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::{OsFamily, OutputFormat, PlatformError, platform_profile};

    #[test]
    fn every_family_maps_to_one_format() {
        for family in OsFamily::ALL {
            let expected = match family {
                OsFamily::Debian | OsFamily::Ubuntu => OutputFormat::Deb,
                _ => OutputFormat::Rpm,
            };
            assert_eq!(family.output_format(), expected, "{family}");
            assert!(!family.default_sources().is_empty());
        }
    }

    #[test]
    fn el_selects_java_by_major_version() {
        let el7 = platform_profile(OsFamily::El, Some(7)).unwrap();
        assert_eq!(el7.java, "jre-11-headless");
        assert_eq!(el7.java_bin, "/usr/lib/jvm/jre-11/bin/java");
        assert!(el7.systemd_el);

        let el9 = platform_profile(OsFamily::El, Some(9)).unwrap();
        assert_eq!(el9.java, "jre-17-headless");
        assert_eq!(el9.java_bin, "/usr/lib/jvm/jre-17/bin/java");

        assert_eq!(
            platform_profile(OsFamily::El, Some(6)),
            Err(PlatformError::UnsupportedElVersion(6))
        );
    }

    #[test]
    fn sles_uses_its_own_systemd_flag() {
        let sles = platform_profile(OsFamily::Sles, Some(15)).unwrap();
        assert!(sles.systemd_sles);
        assert!(sles.sles);
        assert!(!sles.systemd_el);
        assert_eq!(sles.java, "java-11-openjdk-headless");
    }

    #[test]
    fn amazon_pulls_in_tzdata() {
        let amazon = platform_profile(OsFamily::Amazon, Some(2023)).unwrap();
        assert_eq!(amazon.extra_depends, vec!["tzdata-java"]);
        assert!(amazon.systemd_el);
    }

    #[test]
    fn dist_tag_tolerates_missing_version() {
        assert_eq!(OsFamily::El.dist_tag(Some(8)), "el8");
        assert_eq!(OsFamily::Debian.dist_tag(None), "debian");
    }
}
