//! Operator-facing progress output on stdout.

use std::io::Write;
use std::thread;
use std::time::Duration;

const DOTS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct Console {
    delay: Duration,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Console {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No pause between progress dots.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Print a banner followed by a short row of progress dots.
    pub fn announce(&self, message: &str) {
        println!("{message}");
        let mut stdout = std::io::stdout();
        for _ in 0..DOTS {
            print!(".");
            let _ = stdout.flush();
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        println!();
    }

    pub fn line(&self, message: &str) {
        println!("{message}");
    }
}
