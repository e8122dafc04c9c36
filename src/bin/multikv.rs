//! MultiKV Console
//!
//! Opens a store from command-line flags and runs line commands from stdin.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use multikv::config::parse_size;
use multikv::{Config, MultiHashMap, Result, SetOptions, Status};
use tracing_subscriber::{fmt, EnvFilter};

/// MultiKV Console
#[derive(Parser, Debug)]
#[command(name = "multikv")]
#[command(about = "Interactive console for a MultiKV record store")]
#[command(version)]
struct Args {
    /// Number of shards
    #[arg(short, long, default_value = "10")]
    shards: usize,

    /// Total region size (e.g. 64M, 1G)
    #[arg(long, default_value = "64M")]
    size: String,

    /// Average record size hint in bytes
    #[arg(short, long, default_value = "128")]
    data_size: usize,

    /// Average main key size hint in bytes (0 = same as data size)
    #[arg(short, long, default_value = "0")]
    main_key_size: usize,

    /// Shared lock identifier
    #[arg(short, long, default_value = "0")]
    lock_id: u64,

    /// Reclaim soft-deleted records once they are marked clean
    #[arg(long)]
    auto_erase: bool,
}

const HELP: &str = "\
commands:
  set <mk> <uk> <value> [expire_at] [version] [dirty 0|1]
  only <mk>             get <mk> <uk>         meta <mk> <uk>
  all <mk>              del <mk> <uk> [ver]   erase <mk> <uk>
  check <mk>            dirty <mk> <uk>       mark <mk> <uk>
  clean <mk> <uk>       count <mk>            total
  dirtycount            clear                 readonly on|off
  stats                 help                  quit";

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,multikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("MultiKV Console v{}", multikv::VERSION);

    let total_size = match parse_size(&args.size) {
        Ok(size) => size,
        Err(e) => {
            tracing::error!("Invalid --size: {}", e);
            std::process::exit(2);
        }
    };

    let config = Config::builder()
        .shard_count(args.shards)
        .total_size(total_size)
        .data_size(args.data_size)
        .main_key_size(args.main_key_size)
        .lock_id(args.lock_id)
        .auto_erase(args.auto_erase)
        .build();

    let store = match MultiHashMap::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.first() == Some(&"quit") {
            break;
        }
        if words.is_empty() {
            continue;
        }

        let reply = execute(&store, &words);
        if writeln!(stdout, "{}", reply).and_then(|_| stdout.flush()).is_err() {
            break;
        }
    }

    tracing::info!("Console stopped");
}

/// Run one command and render its outcome
fn execute(store: &MultiHashMap, words: &[&str]) -> String {
    let arg = |i: usize| words.get(i).map(|w| w.as_bytes()).unwrap_or_default();

    match words[0] {
        "set" => {
            let opts = match set_options(words) {
                Ok(opts) => opts,
                Err(e) => return e,
            };
            status_line(&store.set(arg(1), arg(2), arg(3), &opts))
        }
        "only" => status_line(&store.set_only_key(arg(1))),
        "get" => render(store.get(arg(1), arg(2)), |value| {
            String::from_utf8_lossy(&value).into_owned()
        }),
        "meta" => render(store.get_at(arg(1), arg(2), true, now()), |view| {
            format!(
                "value={} version={} dirty={} expire_at={} sync_time={}",
                String::from_utf8_lossy(&view.value),
                view.meta.version,
                view.meta.dirty,
                view.meta.expire_at,
                view.meta.sync_time
            )
        }),
        "all" => render(store.get_all(arg(1)), |views| {
            views
                .iter()
                .map(|view| {
                    format!(
                        "{}={}{}",
                        String::from_utf8_lossy(&view.unique_key),
                        String::from_utf8_lossy(&view.value),
                        if view.meta.deleted { " (deleted)" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join(" ")
        }),
        "del" => {
            let version = match number::<u8>(words, 3, "version") {
                Ok(version) => version.unwrap_or(0),
                Err(e) => return e,
            };
            status_line(&store.del_set_bit_versioned(arg(1), arg(2), version, now()))
        }
        "erase" => status_line(&store.del_real(arg(1), arg(2))),
        "check" => {
            let result = store.check_main_key(arg(1));
            Status::from_main_key(&result).to_string()
        }
        "dirty" => {
            let result = store.check_dirty(arg(1), arg(2));
            Status::from_dirty(&result).to_string()
        }
        "mark" => status_line(&store.set_dirty(arg(1), arg(2))),
        "clean" => status_line(&store.set_clean(arg(1), arg(2))),
        "count" => store.count(arg(1)).to_string(),
        "total" => store.total_element_count().to_string(),
        "dirtycount" => store.dirty_count().to_string(),
        "clear" => status_line(&store.clear()),
        "readonly" => {
            store.set_read_only(words.get(1) == Some(&"on"));
            Status::Ok.to_string()
        }
        "stats" => {
            let stats = store.stats();
            format!(
                "groups={} records={} dirty={} shards={}",
                stats.groups(),
                stats.records(),
                stats.dirty(),
                stats.shards.len()
            )
        }
        _ => HELP.to_string(),
    }
}

/// Options of `set <mk> <uk> <value> [expire_at] [version] [dirty 0|1]`
fn set_options(words: &[&str]) -> std::result::Result<SetOptions, String> {
    let dirty = match number::<u8>(words, 6, "dirty flag")? {
        None | Some(1) => true,
        Some(0) => false,
        Some(other) => return Err(format!("ERROR invalid dirty flag: {}", other)),
    };
    Ok(SetOptions::new()
        .expire_at(number::<u32>(words, 4, "expire_at")?.unwrap_or(0))
        .version(number::<u8>(words, 5, "version")?.unwrap_or(0))
        .dirty(dirty))
}

/// Parse an optional numeric argument, rejecting anything out of range
fn number<T: FromStr>(
    words: &[&str],
    i: usize,
    name: &str,
) -> std::result::Result<Option<T>, String> {
    match words.get(i) {
        None => Ok(None),
        Some(word) => word
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("ERROR invalid {}: {}", name, word)),
    }
}

fn status_line<T>(result: &Result<T>) -> String {
    match result {
        Ok(_) => Status::Ok.to_string(),
        Err(e) => format!("{} ({})", Status::from(e), e),
    }
}

fn render<T>(result: Result<T>, show: impl FnOnce(T) -> String) -> String {
    match result {
        Ok(value) => format!("OK {}", show(value)),
        Err(e) => status_line::<()>(&Err(e)),
    }
}

fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
