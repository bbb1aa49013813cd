//! Console reporting for scenario results.

use std::time::Duration;

use colored::Colorize;
use num_format::{Locale, ToFormattedString};

pub fn headline(name: &str) {
    println!("{}", name.bold());
}

pub fn pass(message: &str) {
    println!("[{}] {message}", "PASS".green().bold());
}

pub fn fail(message: &str) {
    println!("[{}] {message}", "FAIL".red().bold());
}

pub fn count(label: &str, value: u64) {
    println!("  {label:<22} {}", value.to_formatted_string(&Locale::en));
}

pub fn elapsed(label: &str, duration: Duration) {
    println!("  {label:<22} {duration:.2?}");
}

pub fn rate(label: &str, value: u64, duration: Duration) {
    let per_second = if duration.is_zero() {
        0
    } else {
        (value as f64 / duration.as_secs_f64()) as u64
    };
    println!(
        "  {label:<22} {}/s",
        per_second.to_formatted_string(&Locale::en)
    );
}
