//! Keypad terminal front end.
//!
//! Reads characters from stdin a line at a time and presses each bound key
//! on the engine, printing the display line after every event. One
//! keystroke maps to exactly one synchronous engine call.

use std::io::{self, BufRead};

use keypad::{Config, Engine, Key};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keypad=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    let mut engine = Engine::with_error_token(&config.display.error_token);

    println!("keypad: 0-9 . + - * / = | s sign | r sqrt | c clear | ? state | q quit");
    print_display(&engine, &config);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        for c in line.chars() {
            match c {
                'q' | 'Q' => return,
                '?' => {
                    match serde_json::to_string_pretty(&engine.snapshot()) {
                        Ok(json) => println!("{json}"),
                        Err(e) => eprintln!("snapshot failed: {e}"),
                    }
                    continue;
                }
                _ => {}
            }

            let Some(key) = Key::from_char(c) else { continue };
            if config.repl.echo_keys {
                println!("< {c}");
            }
            engine.press(key);
            print_display(&engine, &config);
        }
    }
}

/// Print the display line, with the clear label and operator highlight when
/// affordances are enabled.
fn print_display(engine: &Engine, config: &Config) {
    if config.repl.show_affordances {
        let op = engine
            .highlighted_operator()
            .map(|op| op.symbol())
            .unwrap_or(' ');
        println!("[{:>2}]{} {}", engine.clear_label().text(), op, engine.display());
    } else {
        println!("{}", engine.display());
    }
}
