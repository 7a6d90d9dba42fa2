use anyhow::Result;
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::signal;

use crate::events::{SwapEvent, WaitKind};
use crate::ignition::App;
use crate::swap::RouteBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Zero-based route index.
    Toggle(usize),
    Start,
    Exit,
}

/// Maps a 1-based menu entry to a choice: routes first, then start, then exit.
pub fn parse_choice(input: &str, route_count: usize) -> Option<MenuChoice> {
    let choice: usize = input.trim().parse().ok()?;
    match choice {
        n if (1..=route_count).contains(&n) => Some(MenuChoice::Toggle(n - 1)),
        n if n == route_count + 1 => Some(MenuChoice::Start),
        n if n == route_count + 2 => Some(MenuChoice::Exit),
        _ => None,
    }
}

pub fn parse_rounds(input: &str) -> Option<usize> {
    input.trim().parse().ok().filter(|n| *n > 0)
}

pub fn render(routes: &RouteBook) -> String {
    let mut out = String::from("\n    Select Swaps to Toggle\n");
    for (i, route) in routes.all().iter().enumerate() {
        let status = if route.enabled { "Active" } else { "Inactive" };
        out.push_str(&format!("    {}. {} [{}]\n", i + 1, route.name, status));
    }
    out.push_str(&format!(
        "    {}. Start Swaps (Will execute every 10 Minutes)\n",
        routes.len() + 1
    ));
    out.push_str(&format!("    {}. Exit\n", routes.len() + 2));
    out
}

async fn prompt(lines: &mut tokio::io::Lines<BufReader<Stdin>>, text: &str) -> Option<String> {
    println!("{text}");
    tokio::select! {
        line = lines.next_line() => line.ok().flatten(),
        _ = signal::ctrl_c() => None,
    }
}

/// Interactive loop: toggle routes, start runs, exit. Ctrl-C or EOF exits.
pub async fn run_menu(app: App) -> Result<()> {
    let mut routes = app.routes.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", render(&routes));
        let text = format!("\n    Select option (1-{}):", routes.len() + 2);
        let Some(line) = prompt(&mut lines, &text).await else {
            break;
        };

        match parse_choice(&line, routes.len()) {
            Some(MenuChoice::Toggle(i)) => {
                routes.toggle(i);
            }
            Some(MenuChoice::Start) => {
                let Some(line) = prompt(&mut lines, "How many times to make Transactions:").await
                else {
                    break;
                };
                match parse_rounds(&line) {
                    Some(rounds) => {
                        let report = app.run(rounds, &routes).await;
                        println!("\nCompleted {} successful swaps.", report.success_count);
                    }
                    None => println!("Invalid number of transactions"),
                }
            }
            Some(MenuChoice::Exit) => break,
            None => println!("Invalid choice"),
        }
    }

    println!("\nExiting...");
    Ok(())
}

/// Prints executor progress for the operator.
pub async fn print_events(mut events: UnboundedReceiver<SwapEvent>) {
    while let Some(event) = events.next().await {
        match event {
            SwapEvent::RoundStarted { round, of } => println!("\n=== Round {round}/{of} ==="),
            SwapEvent::WalletStarted { index, of, wallet } => {
                println!("\nWallet {index}/{of}: {wallet}")
            }
            SwapEvent::Approving { route, .. } => println!("Approving input token for {route}"),
            SwapEvent::ApprovalFailed { route, reason, .. } => {
                println!("Approval for {route} failed: {reason}")
            }
            SwapEvent::SwapConfirmed { route, tx, .. } => println!("{route} confirmed: {tx}"),
            SwapEvent::SwapFailed { route, reason, .. } => println!("{route} failed: {reason}"),
            SwapEvent::RouteError { route, reason, .. } => println!("{route} skipped: {reason}"),
            SwapEvent::Waiting { kind, duration } => {
                let what = match kind {
                    WaitKind::NextSwap => "next swap",
                    WaitKind::NextWallet => "next account",
                };
                println!("Waiting {} seconds for {what}", duration.as_secs())
            }
            SwapEvent::Cancelled { completed } => {
                println!("Run cancelled after {completed} successful swaps")
            }
        }
    }
}
