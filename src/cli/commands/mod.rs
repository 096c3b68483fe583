use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("target")
                .help("Server to check: https://host:port/, host:port or host")
                .value_name("URL"),
        )
        .arg(
            Arg::new("url")
                .env("TLSDOCTOR_URL")
                .help("Default server URL, used when no positional URL is given")
                .long("url")
                .short('u')
                .value_name("URL"),
        )
        .arg(
            Arg::new("port")
                .default_value("443")
                .env("TLSDOCTOR_PORT")
                .help("Port used when the URL has none")
                .long("port")
                .short('p')
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("trust-dir")
                .env("TLSDOCTOR_TRUST_DIR")
                .help("Directory of trusted certificates, scanned and added to the trust store")
                .long("trust-dir")
                .long_help(
                    "Directory of trusted certificates.\n\n\
                    Every *.pem, *.crt, *.cer and *.der file is checked on its own \
                    (it must parse, be self-issued, carry a valid self-signature and be \
                    inside its validity window) and added to the trust store.\n\n\
                    Example: /etc/tlsdoctor/trusted",
                )
                .short('t')
                .value_name("DIR"),
        )
        .arg(
            Arg::new("ca-file")
                .env("TLSDOCTOR_CA_FILE")
                .help("PEM bundle of additional CA certificates")
                .long("ca-file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("ca-path")
                .env("TLSDOCTOR_CA_PATH")
                .help("Directory of additional CA certificates")
                .long("ca-path")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("no-default-roots")
                .action(ArgAction::SetTrue)
                .env("TLSDOCTOR_NO_DEFAULT_ROOTS")
                .help("Do not trust the bundled web PKI root certificates")
                .long("no-default-roots"),
        )
        .arg(
            Arg::new("tls-min")
                .env("TLSDOCTOR_TLS_MIN")
                .help("Lowest TLS version offered")
                .long("tls-min")
                .value_name("VERSION")
                .value_parser(["1.2", "1.3"]),
        )
        .arg(
            Arg::new("tls-max")
                .env("TLSDOCTOR_TLS_MAX")
                .help("Highest TLS version offered")
                .long("tls-max")
                .value_name("VERSION")
                .value_parser(["1.2", "1.3"]),
        )
        .arg(
            Arg::new("ciphers")
                .env("TLSDOCTOR_CIPHERS")
                .help("Comma separated cipher suites to offer")
                .long("ciphers")
                .long_help(
                    "Comma separated cipher suites to offer, using rustls names.\n\n\
                    Example: TLS13_AES_256_GCM_SHA384,TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
                )
                .value_delimiter(',')
                .value_name("SUITES"),
        )
        .arg(
            Arg::new("timeout")
                .default_value("10")
                .env("TLSDOCTOR_TIMEOUT")
                .help("Connect and handshake timeout in seconds")
                .long("timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("format")
                .default_value("human")
                .env("TLSDOCTOR_FORMAT")
                .help("Output format")
                .long("format")
                .short('f')
                .value_parser(["human", "json"]),
        )
        .arg(
            Arg::new("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .long("verbose")
                .short('v'),
        )
}
