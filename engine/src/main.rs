//! Matching engine entry point.
//!
//! Two threads: the main thread runs the TCP ingress loop, decoding order
//! frames onto the SPSC ring; the matcher thread drains the ring into the
//! order book. Ctrl-C flips the stop flag, both loops wind down, and the
//! telemetry report is dumped.

use clap::Parser;
use common::logging::{LogLevel, Logger};
use common::{log_error, log_info};
use engine::order_book::Orderbook;
use engine::order_server::{OrderRing, OrderServer, OrderServerConfig, DEFAULT_ORDER_PORT};
use engine::telemetry::{IngressTelemetry, Telemetry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Single-instrument limit order book matching engine
#[derive(Parser, Debug)]
#[command(name = "engine")]
#[command(about = "Limit order book matching engine")]
struct Args {
    /// TCP port for order ingress
    #[arg(short, long, default_value_t = DEFAULT_ORDER_PORT)]
    port: u16,

    /// Network interface to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    interface: String,

    /// Log level: debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_log_level(s: &str) -> LogLevel {
    match s {
        "debug" => LogLevel::Debug,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

fn main() {
    let args = Args::parse();

    println!("Starting matching engine...");
    println!("  Ingress: {}:{}", args.interface, args.port);

    let logger = Arc::new(Logger::with_level(parse_log_level(&args.log_level)));
    let telemetry = Arc::new(Telemetry::new());
    let ingress_telemetry = Arc::new(IngressTelemetry::new());
    let ring: Arc<OrderRing> = Arc::new(OrderRing::new());

    let server_config = OrderServerConfig::new(&args.interface, args.port);
    let mut server = match OrderServer::new(
        server_config,
        Arc::clone(&ring),
        Arc::clone(&ingress_telemetry),
        Arc::clone(&logger),
    ) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to bind order server: {}", e);
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nShutdown signal received...");
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Failed to set Ctrl-C handler: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();

    // Matcher thread: sole owner of the book. The stop flag is observed
    // only between dequeues, so any order already popped completes.
    // Logging stays on the main thread; the logger queue is SPSC.
    let matcher = {
        let ring = Arc::clone(&ring);
        let running = Arc::clone(&running);
        let telemetry = Arc::clone(&telemetry);
        thread::spawn(move || {
            let mut book = Orderbook::new(telemetry);
            let mut idle_count = 0u32;

            loop {
                match ring.pop() {
                    Some(cmd) => {
                        idle_count = 0;
                        book.apply(&cmd);
                    }
                    None => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        idle_count = idle_count.saturating_add(1);
                        // Spin first for latency, back off when idle
                        if idle_count < 1000 {
                            std::hint::spin_loop();
                        } else {
                            thread::yield_now();
                        }
                    }
                }
            }

            book
        })
    };

    println!("Engine running. Press Ctrl-C to stop.");
    log_info!(logger, "matcher thread started");
    log_info!(logger, "order server listening", args.port as u64);

    // Ingress loop on the main thread
    while running.load(Ordering::SeqCst) {
        let enqueued = server.poll();
        if enqueued == 0 {
            // Idle: give the OS a moment rather than spinning on accept
            thread::sleep(Duration::from_micros(10));
        }
    }

    println!("Shutting down...");
    server.disconnect_all();

    let book = match matcher.join() {
        Ok(book) => book,
        Err(_) => {
            log_error!(logger, "matcher thread panicked");
            logger.flush();
            std::process::exit(1);
        }
    };
    log_info!(logger, "matcher thread stopped");

    let elapsed_s = start.elapsed().as_secs_f64();
    telemetry.dump(elapsed_s);
    ingress_telemetry.dump(elapsed_s);
    println!(
        "Final book: {} levels, {} resting orders, best_bid={:?}, best_ask={:?}",
        book.active_levels(),
        book.resting_orders(),
        book.best_bid(),
        book.best_ask()
    );
    logger.flush();
}
