//! User interface implementations

use std::time::Duration;

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

use sfcc_runtime::deps::{MessageStyle, ProgressIndicator, UserInterface};

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const TRANSFER_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Production UI implementation using indicatif
pub struct RealUserInterface;

impl UserInterface for RealUserInterface {
    fn create_spinner(&self) -> Box<dyn ProgressIndicator> {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
            pb.set_style(spinner);
        }
        Box::new(RealProgressIndicator { pb })
    }

    fn create_progress_bar(&self, total: u64) -> Box<dyn ProgressIndicator> {
        let pb = ProgressBar::new(total);
        if let Ok(bar) = ProgressStyle::with_template(TRANSFER_TEMPLATE) {
            pb.set_style(bar.progress_chars("#>-"));
        }
        Box::new(RealProgressIndicator { pb })
    }

    fn print(&self, message: &str) {
        println!("{message}");
    }

    fn print_styled(&self, message: &str, msg_style: MessageStyle) {
        let styled = match msg_style {
            MessageStyle::Bold => style(message).bold(),
            MessageStyle::Cyan => style(message).cyan(),
            MessageStyle::Blue => style(message).blue(),
            MessageStyle::Green => style(message).green(),
            MessageStyle::Yellow => style(message).yellow(),
            MessageStyle::Red => style(message).red(),
        };
        println!("{styled}");
    }

    fn is_interactive(&self) -> bool {
        Term::stdout().is_term()
    }
}

struct RealProgressIndicator {
    pb: ProgressBar,
}

impl ProgressIndicator for RealProgressIndicator {
    fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    fn set_position(&self, position: u64) {
        self.pb.set_position(position);
    }

    fn set_length(&self, length: u64) {
        self.pb.set_length(length);
    }

    fn enable_steady_tick(&self, duration: Duration) {
        self.pb.enable_steady_tick(duration);
    }

    fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }

    fn finish_with_message(&self, message: String) {
        self.pb.finish_with_message(message);
    }
}
