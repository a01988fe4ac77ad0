use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::platform::{OsFamily, OutputFormat, PlatformError, PlatformProfile, platform_profile};

const DEFAULT_OWNER: &str = "puppet";
const DEFAULT_RELEASE: &str = "1";
const DEFAULT_TERMINI_CHDIR: &str = "termini";
const DEFAULT_TERMINI_SOURCES: &[&str] = &["opt"];

/// Unresolved options as collected from the command line. Everything is optional here;
/// [`BuildConfig::resolve`] decides what is mandatory.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub operating_system: Option<OsFamily>,
    pub os_version: Option<u32>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub platform_version: Option<u32>,
    pub replaces: Vec<Replace>,
    pub additional_dependencies: Vec<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub additional_dirs: Vec<String>,
    pub realname: Option<String>,
    pub chdir: Option<String>,
    pub sources: Vec<String>,
    pub dist: Option<String>,
    pub debug: bool,
    pub logrotate: bool,
    pub build_termini: bool,
    pub termini_chdir: Option<String>,
    pub termini_sources: Vec<String>,
    pub rpm_triggers: Vec<String>,
    pub deb_interest_triggers: Vec<String>,
    pub deb_activate_triggers: Vec<String>,
    pub description: Option<String>,
    pub termini_description: Option<String>,
}

/// A `--replaces PKG[,VERSION]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub package: String,
    pub version: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--{0} is required!")]
    MissingField(&'static str),
    #[error("invalid --replaces value '{0}', expected PKG[,VERSION]")]
    InvalidReplace(String),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub fn parse_replace(raw: &str) -> Result<Replace, ConfigError> {
    let mut parts = raw.split(',');
    let package = parts.next().unwrap_or_default().trim();
    if package.is_empty() {
        return Err(ConfigError::InvalidReplace(raw.to_string()));
    }

    let version = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(Replace {
        package: package.to_string(),
        version,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AppPaths {
    pub logdir: String,
    pub prefix: String,
    pub data: String,
    pub confdir: String,
}

impl AppPaths {
    fn for_app(realname: &str) -> Self {
        Self {
            logdir: format!("/var/log/puppetlabs/{realname}"),
            prefix: format!("/opt/puppetlabs/server/apps/{realname}"),
            data: format!("/opt/puppetlabs/server/data/{realname}"),
            confdir: format!("/etc/puppetlabs/{realname}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Triggers {
    pub rpm_after_install: Vec<String>,
    pub deb_interest: Vec<String>,
    pub deb_activate: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminiConfig {
    pub build: bool,
    pub chdir: String,
    pub sources: Vec<String>,
    pub description: Option<String>,
}

/// Fully resolved build parameters. Built once by [`BuildConfig::resolve`] and only read
/// afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
    pub name: String,
    pub realname: String,
    pub version: String,
    pub release: String,
    pub platform_version: u32,
    pub operating_system: OsFamily,
    pub os_version: Option<u32>,
    pub output_format: OutputFormat,
    pub dist: String,
    pub profile: PlatformProfile,
    pub chdir: String,
    pub sources: Vec<String>,
    pub paths: AppPaths,
    pub user: String,
    pub group: String,
    pub additional_dirs: Vec<String>,
    pub replaces: IndexMap<String, Option<String>>,
    pub additional_dependencies: Vec<String>,
    pub description: Option<String>,
    pub triggers: Triggers,
    pub logrotate: bool,
    pub debug: bool,
    pub termini: TerminiConfig,
}

impl BuildConfig {
    pub fn resolve(options: BuildOptions) -> Result<Self, ConfigError> {
        let name = options.name.ok_or(ConfigError::MissingField("name"))?;
        let version = options
            .version
            .ok_or(ConfigError::MissingField("package-version"))?;
        let operating_system = options
            .operating_system
            .ok_or(ConfigError::MissingField("operating-system"))?;
        let output_format = operating_system.output_format();

        let os_version = options.os_version;
        if os_version.is_none() && output_format.requires_os_version() {
            return Err(ConfigError::MissingField("os-version"));
        }
        if os_version.is_none() && options.dist.is_none() {
            return Err(ConfigError::MissingField("dist"));
        }

        let profile = platform_profile(operating_system, os_version)?;

        let default_dist = operating_system.dist_tag(os_version);
        let dist = options.dist.unwrap_or_else(|| default_dist.clone());

        let mut release = options
            .release
            .unwrap_or_else(|| DEFAULT_RELEASE.to_string());
        if output_format == OutputFormat::Deb && dist != default_dist {
            release = format!("{release}+{dist}");
        }

        let sources = non_empty_or(options.sources, operating_system.default_sources());
        let termini_sources = non_empty_or(options.termini_sources, DEFAULT_TERMINI_SOURCES);

        let realname = options.realname.unwrap_or_else(|| name.clone());
        let chdir = options.chdir.unwrap_or_else(|| dist.clone());
        let paths = AppPaths::for_app(&realname);

        let mut replaces = IndexMap::new();
        for entry in options.replaces {
            replaces.insert(entry.package, entry.version);
        }

        Ok(Self {
            name,
            realname,
            version,
            release,
            platform_version: options.platform_version.unwrap_or(0),
            operating_system,
            os_version,
            output_format,
            dist,
            profile,
            chdir,
            sources,
            paths,
            user: options.user.unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            group: options.group.unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            additional_dirs: options.additional_dirs,
            replaces,
            additional_dependencies: options.additional_dependencies,
            description: options.description,
            triggers: Triggers {
                rpm_after_install: options.rpm_triggers,
                deb_interest: options.deb_interest_triggers,
                deb_activate: options.deb_activate_triggers,
            },
            logrotate: options.logrotate,
            debug: options.debug,
            termini: TerminiConfig {
                build: options.build_termini,
                chdir: options
                    .termini_chdir
                    .unwrap_or_else(|| DEFAULT_TERMINI_CHDIR.to_string()),
                sources: termini_sources,
                description: options.termini_description,
            },
        })
    }
}

fn non_empty_or(values: Vec<String>, fallback: &[&str]) -> Vec<String> {
    let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
    if values.is_empty() {
        fallback.iter().map(|v| v.to_string()).collect()
    } else {
        values
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{BuildConfig, BuildOptions, ConfigError, Replace, parse_replace};
    use crate::platform::{OsFamily, OutputFormat, PlatformError};

    pub(crate) fn minimal(family: OsFamily, os_version: Option<u32>) -> BuildOptions {
        BuildOptions {
            operating_system: Some(family),
            os_version,
            name: Some("demo".to_string()),
            version: Some("8.1.0".to_string()),
            ..BuildOptions::default()
        }
    }

    #[test]
    fn resolves_every_family_with_only_mandatory_fields() {
        for family in OsFamily::ALL {
            let config = BuildConfig::resolve(minimal(family, Some(8)))
                .unwrap_or_else(|err| panic!("{family} should resolve: {err}"));
            assert_eq!(config.output_format, family.output_format());
            assert!(!config.sources.is_empty());
            assert_eq!(config.dist, format!("{family}8"));
            assert_eq!(config.chdir, config.dist);
            assert_eq!(config.release, "1");
            assert_eq!(config.user, "puppet");
            assert_eq!(config.group, "puppet");
            assert_eq!(config.termini.chdir, "termini");
            assert_eq!(config.termini.sources, vec!["opt"]);
        }
    }

    #[test]
    fn reports_missing_fields_in_order() {
        let err = BuildConfig::resolve(BuildOptions::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("name"));
        assert_eq!(err.to_string(), "--name is required!");

        let mut options = minimal(OsFamily::El, Some(8));
        options.version = None;
        assert_eq!(
            BuildConfig::resolve(options).unwrap_err(),
            ConfigError::MissingField("package-version")
        );

        let mut options = minimal(OsFamily::El, Some(8));
        options.operating_system = None;
        assert_eq!(
            BuildConfig::resolve(options).unwrap_err(),
            ConfigError::MissingField("operating-system")
        );
    }

    #[test]
    fn rpm_requires_os_version_even_with_dist() {
        let mut options = minimal(OsFamily::Fedora, None);
        options.dist = Some("fc40".to_string());
        assert_eq!(
            BuildConfig::resolve(options).unwrap_err(),
            ConfigError::MissingField("os-version")
        );
    }

    #[test]
    fn deb_needs_dist_only_without_os_version() {
        assert_eq!(
            BuildConfig::resolve(minimal(OsFamily::Ubuntu, None)).unwrap_err(),
            ConfigError::MissingField("dist")
        );

        let mut options = minimal(OsFamily::Ubuntu, None);
        options.dist = Some("noble".to_string());
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.dist, "noble");
        assert_eq!(config.release, "1+noble");
        assert_eq!(config.chdir, "noble");
    }

    #[test]
    fn debian_release_suffix_follows_dist() {
        let config = BuildConfig::resolve(minimal(OsFamily::Debian, Some(12))).unwrap();
        assert_eq!(config.dist, "debian12");
        assert_eq!(config.release, "1");

        let mut options = minimal(OsFamily::Debian, Some(12));
        options.dist = Some("bookworm".to_string());
        options.release = Some("3".to_string());
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.release, "3+bookworm");
    }

    #[test]
    fn rpm_release_is_never_suffixed() {
        let mut options = minimal(OsFamily::El, Some(9));
        options.dist = Some("el9fips".to_string());
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.release, "1");
        assert_eq!(config.dist, "el9fips");
    }

    #[test]
    fn el_version_out_of_range_is_fatal() {
        assert_eq!(
            BuildConfig::resolve(minimal(OsFamily::El, Some(6))).unwrap_err(),
            ConfigError::Platform(PlatformError::UnsupportedElVersion(6))
        );
    }

    #[test]
    fn realname_drives_derived_paths() {
        let mut options = minimal(OsFamily::El, Some(8));
        options.name = Some("openvox-server".to_string());
        options.realname = Some("puppetserver".to_string());
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.paths.logdir, "/var/log/puppetlabs/puppetserver");
        assert_eq!(config.paths.prefix, "/opt/puppetlabs/server/apps/puppetserver");
        assert_eq!(config.paths.data, "/opt/puppetlabs/server/data/puppetserver");
        assert_eq!(config.paths.confdir, "/etc/puppetlabs/puppetserver");

        let config = BuildConfig::resolve(minimal(OsFamily::El, Some(8))).unwrap();
        assert_eq!(config.realname, "demo");
    }

    #[test]
    fn default_sources_depend_on_format() {
        let rpm = BuildConfig::resolve(minimal(OsFamily::Sles, Some(15))).unwrap();
        assert_eq!(rpm.sources, vec!["etc", "opt", "usr", "var"]);

        let deb = BuildConfig::resolve(minimal(OsFamily::Debian, Some(12))).unwrap();
        assert_eq!(deb.output_format, OutputFormat::Deb);
        assert_eq!(deb.sources, vec!["etc", "lib", "opt", "var"]);

        let mut options = minimal(OsFamily::El, Some(8));
        options.sources = vec!["opt".to_string(), String::new()];
        let explicit = BuildConfig::resolve(options).unwrap();
        assert_eq!(explicit.sources, vec!["opt"]);
    }

    #[test]
    fn termini_chdir_and_sources_are_independent() {
        let mut options = minimal(OsFamily::El, Some(8));
        options.termini_sources = vec!["opt".to_string(), "usr".to_string()];
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.termini.chdir, "termini");
        assert_eq!(config.termini.sources, vec!["opt", "usr"]);

        let mut options = minimal(OsFamily::El, Some(8));
        options.termini_chdir = Some("termini-build".to_string());
        let config = BuildConfig::resolve(options).unwrap();
        assert_eq!(config.termini.chdir, "termini-build");
        assert_eq!(config.termini.sources, vec!["opt"]);
    }

    #[test]
    fn later_replaces_overwrite_but_keep_position() {
        let mut options = minimal(OsFamily::El, Some(8));
        options.replaces = vec![
            parse_replace("puppetdb,7.0").unwrap(),
            parse_replace("puppetdb-termini").unwrap(),
            parse_replace("puppetdb,7.1").unwrap(),
        ];
        let config = BuildConfig::resolve(options).unwrap();
        let entries: Vec<_> = config.replaces.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (&"puppetdb".to_string(), &Some("7.1".to_string())));
        assert_eq!(entries[1], (&"puppetdb-termini".to_string(), &None));
    }

    #[test]
    fn parse_replace_handles_optional_version() {
        assert_eq!(
            parse_replace("foo,2.0").unwrap(),
            Replace {
                package: "foo".to_string(),
                version: Some("2.0".to_string())
            }
        );
        assert_eq!(parse_replace("foo,").unwrap().version, None);
        assert_eq!(parse_replace("foo").unwrap().version, None);
        assert!(matches!(
            parse_replace(",1.0"),
            Err(ConfigError::InvalidReplace(_))
        ));
    }
}
