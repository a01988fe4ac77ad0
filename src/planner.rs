use serde::Serialize;

use crate::config::BuildConfig;
use crate::platform::OutputFormat;

/// Rewrites the `%dir %attr(-, user, group) <data dir>` line fpm generates into a recursive
/// ownership line plus a `%dir` line carrying mode 770 for the top-level directory only.
pub const FPM_EDITOR: &str = r"sed -i 's/%dir %attr(-\(.*\)/%attr(-\1\n%dir %attr(770\1/'";

const VENDOR: &str = "'Vox Pupuli <openvox@voxpupuli.org>'";
const LICENSE: &str = "'ASL 2.0'";
const PROJECT_URL: &str = "http://github.com/openvoxproject";

const LEGACY_TERMINI_OWNER: &str = "openvoxdb";
const LEGACY_TERMINI_PACKAGE: &str = "puppetdb-termini";
const TERMINI_AGENT: &str = "openvox-agent";

const DEB_BUILD_DEPENDS: &[&str] = &[
    "cdbs",
    "bc",
    "mawk",
    "lsb-release",
    "\"ruby | ruby-interpreter\"",
];
const DEB_REPLACE_ORIGINS: &[&str] = &["voxpupuli1", "puppetlabs1"];

// Parent directories owned by other packages; rpm must never claim them.
const PRIMARY_EXCLUDED_DIRS: &[&str] = &[
    "/etc/puppetlabs",
    "/opt/puppetlabs/bin",
    "/opt/puppetlabs/server",
    "/opt/puppetlabs/server/apps",
    "/opt/puppetlabs/server/bin",
    "/opt/puppetlabs/server/data",
    "/usr/lib/systemd",
    "/usr/lib/systemd/system",
    "/etc/logrotate.d",
    "/var/log/puppetlabs",
];

const TERMINI_EXCLUDED_DIRS: &[&str] = &[
    "/opt/puppetlabs/puppet",
    "/opt/puppetlabs/puppet/lib",
    "/opt/puppetlabs/puppet/lib/ruby",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/face",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/face/node",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/functions",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/indirector",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/indirector/catalog",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/indirector/facts",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/indirector/node",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/indirector/resource",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/reports",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/util",
    "/opt/puppetlabs/puppet/lib/ruby/vendor_ruby/puppet/util/puppetdb",
];

/// Ordered fpm argument tokens. Tokens are shell text and are joined with single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FpmArgs(Vec<String>);

impl FpmArgs {
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn command_line(&self) -> String {
        self.0.join(" ")
    }
}

/// Tokens identical for the primary and termini packages.
#[derive(Debug, Default)]
struct SharedArgs(Vec<String>);

impl SharedArgs {
    fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }
}

/// Collects target specific tokens. The only way out is [`ArgsBuilder::finish`], which places
/// `--chdir`, the shared tokens and the source list at the end.
#[derive(Debug, Default)]
struct ArgsBuilder {
    tokens: Vec<String>,
}

impl ArgsBuilder {
    fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    fn finish(mut self, chdir: &str, shared: &SharedArgs, sources: &[String]) -> FpmArgs {
        self.tokens.push(format!("--chdir {chdir}"));
        self.tokens.extend(shared.0.iter().cloned());
        self.tokens.push(sources.join(" "));
        FpmArgs(self.tokens)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Primary,
    Termini,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub target: Target,
    pub args: FpmArgs,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Shell text for `program` with this invocation's arguments, without environment overrides.
    pub fn shell_command(&self, program: &str) -> String {
        format!("{program} {}", self.args.command_line())
    }

    /// Shell text including environment overrides, as shown to operators.
    pub fn display_command(&self, program: &str) -> String {
        let mut line = String::new();
        for (key, value) in &self.env {
            line.push_str(&format!("{key}=\"{value}\" "));
        }
        line.push_str(&self.shell_command(program));
        line
    }
}

#[derive(Debug, Serialize)]
pub struct BuildPlan {
    pub name: String,
    pub dist: String,
    pub primary: Invocation,
    pub termini: Option<Invocation>,
}

pub fn plan_build(config: &BuildConfig) -> BuildPlan {
    let (primary, termini) = assemble_args(config);

    BuildPlan {
        name: config.name.clone(),
        dist: config.dist.clone(),
        primary: Invocation {
            target: Target::Primary,
            args: primary,
            env: vec![("FPM_EDITOR".to_string(), FPM_EDITOR.to_string())],
        },
        termini: config.termini.build.then(|| Invocation {
            target: Target::Termini,
            args: termini,
            env: Vec::new(),
        }),
    }
}

/// Builds the primary and termini argument vectors for `config`.
pub fn assemble_args(config: &BuildConfig) -> (FpmArgs, FpmArgs) {
    let mut primary = ArgsBuilder::default();
    let mut termini = ArgsBuilder::default();
    let mut shared = SharedArgs::default();

    match config.output_format {
        OutputFormat::Rpm => rpm_args(config, &mut primary, &mut termini, &mut shared),
        OutputFormat::Deb => deb_args(config, &mut primary),
    }

    primary.push(format!("--name {}", config.name));
    if let Some(description) = &config.description {
        primary.push(format!("--description '{description}'"));
    }
    termini.push(format!("--name {}-termini", config.name));
    if let Some(description) = &config.termini.description {
        termini.push(format!("--description '{description}'"));
    }

    shared.push(format!("--version {}", config.version));
    shared.push(format!("--iteration {}", config.release));
    shared.push(format!("--vendor {VENDOR}"));
    shared.push(format!("--maintainer {VENDOR}"));
    shared.push(format!("--license {LICENSE}"));
    shared.push(format!("--url {PROJECT_URL}"));
    shared.push("--architecture all");

    replace_args(config, &mut primary);

    if config.name == LEGACY_TERMINI_OWNER {
        termini.push(format!("--replaces '{LEGACY_TERMINI_PACKAGE}'"));
        termini.push(format!("--conflicts '{LEGACY_TERMINI_PACKAGE}'"));
    }

    primary.push(format!("--depends '{}'", config.profile.java));
    primary.push("--depends bash");
    match config.output_format {
        OutputFormat::Rpm => primary.push("--depends /usr/bin/which"),
        OutputFormat::Deb => primary.push("--depends adduser"),
    }
    primary.push("--depends procps");

    termini.push(format!("--depends {TERMINI_AGENT}"));

    for dep in &config.additional_dependencies {
        primary.push(format!("--depends '{dep}'"));
    }

    let script_dir = config.output_format.script_dir();
    primary.push(format!("--before-install {script_dir}/preinst"));
    primary.push(format!("--after-install {script_dir}/postinst"));
    primary.push(format!("--before-remove {script_dir}/prerm"));
    primary.push(format!("--after-remove {script_dir}/postrm"));

    primary.push("--force");

    shared.push(format!("--output-type {}", config.output_format));
    shared.push("--input-type dir");

    (
        primary.finish(&config.chdir, &shared, &config.sources),
        termini.finish(&config.termini.chdir, &shared, &config.termini.sources),
    )
}

fn rpm_args(
    config: &BuildConfig,
    primary: &mut ArgsBuilder,
    termini: &mut ArgsBuilder,
    shared: &mut SharedArgs,
) {
    let paths = &config.paths;
    let profile = &config.profile;
    let owner = format!("{},{}", config.user, config.group);

    shared.push("--rpm-digest sha256");
    shared.push(format!("--rpm-rpmbuild-define 'rpmversion {}'", config.version));
    primary.push(format!("--rpm-rpmbuild-define '_app_logdir {}'", paths.logdir));
    primary.push(format!("--rpm-rpmbuild-define '_app_prefix {}'", paths.prefix));
    primary.push(format!("--rpm-rpmbuild-define '_app_data {}'", paths.data));

    for dep in &profile.extra_depends {
        primary.push(format!("--depends {dep}"));
    }

    primary.push(format!(
        "--rpm-rpmbuild-define '_systemd_el {}'",
        u8::from(profile.systemd_el)
    ));
    primary.push(format!(
        "--rpm-rpmbuild-define '_systemd_sles {}'",
        u8::from(profile.systemd_sles)
    ));
    primary.push("--rpm-rpmbuild-define '_sysconfdir /etc'");
    primary.push(format!("--rpm-rpmbuild-define '_prefix {}'", paths.prefix));
    primary.push("--rpm-rpmbuild-define '__jar_repack 0'");

    shared.push(format!("--rpm-dist {}", config.dist));

    if profile.systemd_el {
        primary.push("--depends systemd");
    }
    if profile.systemd_sles {
        primary.push("--rpm-tag '%{?systemd_requires}'");
    }

    primary.push(format!("--config-files {}", paths.confdir));
    primary.push(format!("--config-files /etc/sysconfig/{}", config.realname));

    for dir in &config.additional_dirs {
        primary.push(format!("--directories {dir}"));
        primary.push(format!("--rpm-attr 700,{owner}:{dir}"));
    }

    for trigger in &config.triggers.rpm_after_install {
        primary.push(format!("--rpm-trigger-after-install {trigger}"));
    }

    if config.logrotate {
        primary.push(format!("--config-files /etc/logrotate.d/{}", config.realname));
    }

    primary.push(format!("--directories {}", paths.logdir));
    primary.push(format!("--directories {}", paths.confdir));
    shared.push("--rpm-auto-add-directories");
    shared.push("--rpm-auto-add-exclude-directories /opt/puppetlabs");
    for dir in PRIMARY_EXCLUDED_DIRS {
        primary.push(format!("--rpm-auto-add-exclude-directories {dir}"));
    }
    for dir in TERMINI_EXCLUDED_DIRS {
        termini.push(format!("--rpm-auto-add-exclude-directories {dir}"));
    }

    primary.push(format!("--rpm-attr 750,{owner}:{}", paths.confdir));
    primary.push(format!("--rpm-attr 750,{owner}:{}", paths.logdir));
    // Mode stays unset here; FPM_EDITOR adds the 770 directory line.
    primary.push(format!("--rpm-attr -,{owner}:{}", paths.data));

    primary.push("--edit");
    primary.push("--category 'System Environment/Daemons'");
    termini.push("--category 'Development/Libraries'");
}

fn deb_args(config: &BuildConfig, primary: &mut ArgsBuilder) {
    for dep in DEB_BUILD_DEPENDS {
        primary.push(format!("--deb-build-depends {dep}"));
    }
    primary.push("--deb-priority optional");
    primary.push("--category utils");

    for trigger in &config.triggers.deb_interest {
        primary.push(format!("--deb-interest {trigger}"));
    }
    for trigger in &config.triggers.deb_activate {
        primary.push(format!("--deb-activate {trigger}"));
    }
}

fn replace_args(config: &BuildConfig, primary: &mut ArgsBuilder) {
    for (package, version) in &config.replaces {
        let package = strip_quotes(package);
        let version = version.as_deref().map(strip_quotes).filter(|v| !v.is_empty());

        let constraints: Vec<String> = match (config.output_format, version) {
            (_, None) => vec![format!("'{package}'")],
            (OutputFormat::Rpm, Some(version)) => vec![format!("'{package} <= {version}-1'")],
            (OutputFormat::Deb, Some(version)) => DEB_REPLACE_ORIGINS
                .iter()
                .copied()
                .chain(std::iter::once(config.dist.as_str()))
                .map(|origin| format!("'{package} (<< {version}-1{origin})'"))
                .collect(),
        };

        for constraint in constraints {
            primary.push(format!("--replaces {constraint}"));
            primary.push(format!("--conflicts {constraint}"));
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('\'').unwrap_or(value);
    value.strip_suffix('\'').unwrap_or(value)
}
