mod render;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use planner_core::{
    Dashboard, LeafId, LeafRef, Notice, PlannerConfig, RecordsScreen, Role, Screen,
    SessionContext, SummaryScreen, TenantId, TenantRef,
};
use planner_http::HttpCatalog;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit status for configuration problems
const EXIT_CONFIG: u8 = 2;

fn cli() -> Command {
    Command::new("planner")
        .version(planner_core::VERSION)
        .about("Tenant dashboard: general summary, leaf detail and operational records")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("Backend base URL"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .help("Bearer credential forwarded to the backend"),
        )
        .arg(
            Arg::new("role")
                .long("role")
                .global(true)
                .default_value("ies")
                .help("Session role: admin or ies"),
        )
        .arg(
            Arg::new("tenant-id")
                .long("tenant-id")
                .global(true)
                .value_parser(value_parser!(i64))
                .help("Active tenant id"),
        )
        .arg(
            Arg::new("tenant-slug")
                .long("tenant-slug")
                .global(true)
                .help("Active tenant slug (operational endpoints)"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Maximum leaf summaries in flight"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print views as JSON"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(Command::new("summary").about("Build the general summary of the active tenant"))
        .subcommand(
            Command::new("leaf")
                .about("Detailed summary of one leaf")
                .arg(
                    Arg::new("leaf-id")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("records")
                .about("Operational records of one leaf")
                .arg(
                    Arg::new("leaf-id")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(Command::new("tenants").about("List the tenant directory"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<PlannerConfig> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => PlannerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PlannerConfig::new(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(url) = args.get_one::<String>("base-url") {
        config = config.with_base_url(url.clone());
    }
    if let Some(token) = args.get_one::<String>("token") {
        config = config.with_token(token.clone());
    }
    if let Some(limit) = args.get_one::<usize>("concurrency") {
        config = config.with_fan_out_limit(*limit);
    }
    config.validate()?;
    Ok(config)
}

fn load_session(args: &ArgMatches) -> anyhow::Result<SessionContext> {
    let role: Role = args
        .get_one::<String>("role")
        .map_or("ies", String::as_str)
        .parse()?;

    let tenant = TenantRef {
        id: args.get_one::<i64>("tenant-id").copied().map(TenantId),
        slug: args.get_one::<String>("tenant-slug").cloned(),
        name: None,
    };
    let has_tenant = tenant.id.is_some() || tenant.slug.is_some();

    Ok(match role {
        Role::Administrator if has_tenant => SessionContext::administrator().with_tenant(tenant),
        Role::Administrator => SessionContext::administrator(),
        Role::TenantOperator => SessionContext::operator(tenant),
    })
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn flush_notices(dashboard: &Dashboard) {
    for notice in dashboard.notices() {
        eprintln!("{}", render::notice_line(&notice));
    }
}

fn refused(dashboard: &Dashboard) -> ExitCode {
    flush_notices(dashboard);
    ExitCode::FAILURE
}

async fn run(dashboard: &Dashboard, args: &ArgMatches, json: bool) -> anyhow::Result<ExitCode> {
    match args.subcommand() {
        Some(("summary", _)) => match dashboard.open_summary().await {
            Screen::Summary { summary } => {
                flush_notices(dashboard);
                emit(json, &summary, || match &summary {
                    SummaryScreen::Ready { view } => render::summary_table(view),
                    SummaryScreen::NoPrograms => "No programs in the catalog.\n".into(),
                    SummaryScreen::NoLeaves => "No leaves under any program.\n".into(),
                    SummaryScreen::Failed { .. } | SummaryScreen::Loading { .. } => String::new(),
                })?;
                Ok(match summary {
                    SummaryScreen::Failed { .. } | SummaryScreen::Loading { .. } => ExitCode::FAILURE,
                    _ => ExitCode::SUCCESS,
                })
            }
            _ => Ok(refused(dashboard)),
        },

        Some(("leaf", sub)) => {
            let id = leaf_id(sub)?;
            match dashboard.open_leaf_detail(id).await {
                Ok(detail) => {
                    emit(json, &detail, || render::leaf_detail(&detail))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(_) => Ok(refused(dashboard)),
            }
        }

        Some(("records", sub)) => {
            let id = leaf_id(sub)?;
            let leaf = LeafRef {
                id,
                name: format!("Leaf {id}"),
            };
            match dashboard.open_operational(leaf).await {
                Screen::Operational {
                    records: RecordsScreen::Ready { records },
                    ..
                } => {
                    emit(json, &records, || render::records_table(&records))?;
                    Ok(ExitCode::SUCCESS)
                }
                _ => Ok(refused(dashboard)),
            }
        }

        Some(("tenants", _)) => match dashboard.tenants().await {
            Ok(tenants) => {
                emit(json, &tenants, || render::tenants_table(&tenants))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                let notice = Notice::from_error("Could not load the tenant directory", &e);
                eprintln!("{}", render::notice_line(&notice));
                Ok(ExitCode::FAILURE)
            }
        },

        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn leaf_id(args: &ArgMatches) -> anyhow::Result<LeafId> {
    args.get_one::<i64>("leaf-id")
        .copied()
        .map(LeafId)
        .context("leaf id is required")
}

/// Fill in the administrator's tenant slug and name from the directory
async fn resolve_admin_tenant(dashboard: &Dashboard) {
    let session = dashboard.session();
    if !session.role.is_admin() || session.tenant_slug().is_some() {
        return;
    }
    let Some(id) = session.tenant_id() else {
        return;
    };
    if let Err(e) = dashboard.select_tenant_by_id(id).await {
        tracing::warn!(tenant = %id, error = %e, "could not resolve tenant from directory");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let json = matches.get_flag("json");

    let setup = load_config(&matches).and_then(|config| {
        let session = load_session(&matches)?;
        let api = HttpCatalog::new(&config)?;
        Ok((config, session, api))
    });
    let (config, session, api) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing::debug!(base_url = %config.base_url, role = %session.role, "starting");
    let dashboard = Dashboard::new(Arc::new(api), config, session);

    if matches.subcommand_name() != Some("tenants") {
        resolve_admin_tenant(&dashboard).await;
    }

    match run(&dashboard, &matches, json).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
