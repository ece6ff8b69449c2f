use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "podscope",
    version,
    about = "Live pod health across Kubernetes contexts and namespaces."
)]
pub struct CliArgs {
    /// Kubeconfig context (defaults to the current context)
    #[arg(short, long)]
    pub context: Option<String>,

    /// Namespace to watch; `*` matches any run of characters (for example: team-*)
    #[arg(short, long, required_unless_present = "group")]
    pub namespace: Option<String>,

    /// Group profile from the config file, by name or numeric id
    #[arg(short, long, conflicts_with = "namespace")]
    pub group: Option<String>,

    /// Seconds between acquisition cycles
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Resolve the targets, print them as JSON and exit
    #[arg(long)]
    pub print_group: bool,
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn namespace_or_group_is_required() {
        assert!(CliArgs::try_parse_from(["podscope"]).is_err());
        assert!(CliArgs::try_parse_from(["podscope", "-n", "a", "-g", "b"]).is_err());

        let args = CliArgs::try_parse_from(["podscope", "-c", "dev", "-n", "team-*"])
            .expect("namespace form parses");
        assert_eq!(args.context.as_deref(), Some("dev"));
        assert_eq!(args.namespace.as_deref(), Some("team-*"));
        assert_eq!(args.refresh_secs, 5);

        let args = CliArgs::try_parse_from(["podscope", "--group", "payments", "--print-group"])
            .expect("group form parses");
        assert_eq!(args.group.as_deref(), Some("payments"));
        assert!(args.print_group);
    }

    #[test]
    fn refresh_interval_has_floor() {
        assert!(CliArgs::try_parse_from(["podscope", "-n", "a", "--refresh-secs", "0"]).is_err());
    }
}
