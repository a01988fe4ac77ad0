use std::io::Write;

use anyhow::Context;
use clap::{ArgAction, Parser};

use crate::config::{BuildConfig, BuildOptions, Replace, parse_replace};
use crate::executor::{ShellRunner, execute_plan};
use crate::planner::plan_build;
use crate::platform::OsFamily;

const BANNER: &str = "==========================";

#[derive(Debug, Parser)]
#[command(
    name = "ezbake-fpm",
    version,
    about = "Build rpm and deb packages for ezbake projects with fpm",
    args_override_self = true
)]
pub struct Args {
    /// Select operating system
    #[arg(short = 'o', long = "operating-system", value_enum, value_name = "OS")]
    operating_system: Option<OsFamily>,
    /// VERSION of the operating system to build for
    #[arg(long, value_name = "VERSION")]
    os_version: Option<u32>,
    /// Name of the PROJECT to build
    #[arg(short, long, value_name = "PROJECT")]
    name: Option<String>,
    /// VERSION of the package to build
    #[arg(long, value_name = "VERSION")]
    package_version: Option<String>,
    /// RELEASE of the package
    #[arg(long)]
    release: Option<String>,
    /// VERSION of the puppet platform this builds for
    #[arg(long, value_name = "VERSION")]
    platform_version: Option<u32>,
    /// PKG and VERSION replaced by this package. Can be passed multiple times.
    #[arg(long = "replaces", value_name = "PKG,VERSION", value_parser = parse_replace)]
    replaces: Vec<Replace>,
    /// Additional dependency this package has. Can be passed multiple times.
    #[arg(long = "additional-dependency", value_name = "DEP")]
    additional_dependencies: Vec<String>,
    /// USER that should be added with this package
    #[arg(short, long)]
    user: Option<String>,
    /// GROUP that should be added with this package
    #[arg(short, long)]
    group: Option<String>,
    /// The package should additionally create DIR
    #[arg(long = "create-dir", value_name = "DIR")]
    create_dirs: Vec<String>,
    /// The realname
    #[arg(long)]
    realname: Option<String>,
    /// The dir to chdir to before building
    #[arg(long, value_name = "DIR")]
    chdir: Option<String>,
    /// Comma-separated list of source dirs
    #[arg(long, value_name = "DIR", value_delimiter = ',', action = ArgAction::Set)]
    source: Vec<String>,
    /// The dist tag
    #[arg(long, value_name = "NAME")]
    dist: Option<String>,
    /// Print the resolved options and fpm commands
    #[arg(long, overrides_with = "no_debug")]
    debug: bool,
    #[arg(long, overrides_with = "debug", hide = true)]
    no_debug: bool,
    /// Ship a logrotate config file
    #[arg(long, overrides_with = "no_logrotate")]
    logrotate: bool,
    #[arg(long, overrides_with = "logrotate", hide = true)]
    no_logrotate: bool,
    /// Also build a termini package
    #[arg(long, overrides_with = "no_build_termini")]
    build_termini: bool,
    #[arg(long, overrides_with = "build_termini", hide = true)]
    no_build_termini: bool,
    /// DIR for the termini build, defaults to "termini"
    #[arg(long, value_name = "DIR")]
    termini_chdir: Option<String>,
    /// Sources for the termini build, defaults to "opt"
    #[arg(long, value_name = "SOURCES", value_delimiter = ',', action = ArgAction::Set)]
    termini_sources: Vec<String>,
    /// TRIGGER for the rpm packages, in the format package:file_containing_script
    #[arg(long = "rpm-trigger", value_name = "TRIGGER")]
    rpm_triggers: Vec<String>,
    /// Name of the interest TRIGGER for the deb packages
    #[arg(long = "deb-interest-trigger", value_name = "TRIGGER")]
    deb_interest_triggers: Vec<String>,
    /// Name of the activate TRIGGER for the deb packages
    #[arg(long = "deb-activate-trigger", value_name = "TRIGGER")]
    deb_activate_triggers: Vec<String>,
    /// Description for the package
    #[arg(long)]
    description: Option<String>,
    /// Description for the termini package
    #[arg(long)]
    termini_description: Option<String>,
    /// fpm program to run
    #[arg(long, value_name = "PROGRAM", default_value = "fpm")]
    fpm_bin: String,
}

impl Args {
    pub fn into_options(self) -> BuildOptions {
        BuildOptions {
            operating_system: self.operating_system,
            os_version: self.os_version,
            name: self.name,
            version: self.package_version,
            release: self.release,
            platform_version: self.platform_version,
            replaces: self.replaces,
            additional_dependencies: self.additional_dependencies,
            user: self.user,
            group: self.group,
            additional_dirs: self.create_dirs,
            realname: self.realname,
            chdir: self.chdir,
            sources: self.source,
            dist: self.dist,
            debug: self.debug && !self.no_debug,
            logrotate: self.logrotate && !self.no_logrotate,
            build_termini: self.build_termini && !self.no_build_termini,
            termini_chdir: self.termini_chdir,
            termini_sources: self.termini_sources,
            rpm_triggers: self.rpm_triggers,
            deb_interest_triggers: self.deb_interest_triggers,
            deb_activate_triggers: self.deb_activate_triggers,
            description: self.description,
            termini_description: self.termini_description,
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let fpm_bin = args.fpm_bin.clone();

    let config = BuildConfig::resolve(args.into_options())?;
    log::debug!("platform profile for {}: {:?}", config.dist, config.profile);
    let plan = plan_build(&config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if config.debug {
        writeln!(out, "{BANNER}")?;
        writeln!(out, "OPTIONS HASH")?;
        writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
        writeln!(out, "{BANNER}")?;
    }

    let runner = ShellRunner::new(&fpm_bin)?;
    let result = execute_plan(&plan, &runner, &mut out, config.debug)
        .with_context(|| format!("building {} for {}", config.name, config.dist))?;
    log::info!(
        "built {} for {} ({} fpm runs)",
        config.name,
        config.dist,
        result.invocations
    );

    Ok(())
}
