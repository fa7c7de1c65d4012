// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial line and transaction settings.

use std::time::Duration;

/// Number of bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl DataBits {
    const fn count(self) -> u32 {
        match self {
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Baud rates above this value use a fixed inter-frame gap.
const FIXED_GAP_BAUD_RATE: u32 = 19_200;

/// Inter-frame gap for baud rates above 19200.
const FIXED_INTER_FRAME_GAP: Duration = Duration::from_micros(1_750);

/// Settings of the serial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialConfig {
    /// 115200 baud, 8 data bits, no parity, 1 stop bit.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Number of bits on the wire per character, including start,
    /// parity and stop bits.
    #[must_use]
    pub fn bits_per_char(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Odd | Parity::Even => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + self.data_bits.count() + parity + stop
    }

    /// Transmission time of a single character.
    #[must_use]
    pub fn char_time(&self) -> Duration {
        let bits = u64::from(self.bits_per_char());
        let baud_rate = u64::from(self.baud_rate.max(1));
        Duration::from_nanos(bits * 1_000_000_000 / baud_rate)
    }

    /// The silence of 3.5 character times that separates two frames.
    ///
    /// Above 19200 baud a fixed value of 1.75 ms is used, as recommended
    /// by the serial line implementation guide.
    #[must_use]
    pub fn inter_frame_gap(&self) -> Duration {
        if self.baud_rate > FIXED_GAP_BAUD_RATE {
            return FIXED_INTER_FRAME_GAP;
        }
        self.char_time() * 7 / 2
    }

    #[cfg(feature = "serial")]
    pub(crate) fn builder(&self) -> tokio_serial::SerialPortBuilder {
        let data_bits = match self.data_bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        };
        let parity = match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        };
        let stop_bits = match self.stop_bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        };
        tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
    }
}

/// Timing and retry policy of the transaction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Time to wait for the first byte of a response.
    pub response_timeout: Duration,

    /// Silence that terminates a frame. `None` uses 1.75 ms.
    pub inter_frame_timeout: Option<Duration>,

    /// Number of times a failed request is repeated. A value of 3
    /// results in up to 4 attempts.
    pub max_retries: u8,

    /// Pause before a failed request is repeated.
    pub retry_backoff: Duration,

    /// Time given to all slaves for processing a broadcast request.
    pub broadcast_delay: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            inter_frame_timeout: None,
            max_retries: 3,
            retry_backoff: Duration::from_millis(20),
            broadcast_delay: Duration::from_millis(100),
        }
    }
}

impl TransactionConfig {
    #[must_use]
    pub fn inter_frame_timeout(&self) -> Duration {
        self.inter_frame_timeout.unwrap_or(FIXED_INTER_FRAME_GAP)
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub serial: SerialConfig,
    pub transaction: TransactionConfig,
}

impl Config {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            serial: SerialConfig::new(path),
            transaction: TransactionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial.baud_rate = baud_rate;
        self
    }

    #[must_use]
    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.serial.data_bits = data_bits;
        self
    }

    #[must_use]
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.serial.parity = parity;
        self
    }

    #[must_use]
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.serial.stop_bits = stop_bits;
        self
    }

    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.transaction.response_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_inter_frame_timeout(mut self, timeout: Duration) -> Self {
        self.transaction.inter_frame_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.transaction.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.transaction.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_broadcast_delay(mut self, delay: Duration) -> Self {
        self.transaction.broadcast_delay = delay;
        self
    }

    /// Transaction settings with the inter-frame timeout derived from
    /// the serial line unless set explicitly.
    #[must_use]
    pub fn transaction_config(&self) -> TransactionConfig {
        TransactionConfig {
            inter_frame_timeout: Some(
                self.transaction
                    .inter_frame_timeout
                    .unwrap_or_else(|| self.serial.inter_frame_gap()),
            ),
            ..self.transaction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.data_bits, DataBits::Eight);
        assert_eq!(config.serial.parity, Parity::None);
        assert_eq!(config.serial.stop_bits, StopBits::One);
        assert_eq!(config.transaction.response_timeout, Duration::from_millis(500));
        assert_eq!(config.transaction.max_retries, 3);
    }

    #[test]
    fn bits_per_char() {
        let serial = SerialConfig::new("tty");
        assert_eq!(serial.bits_per_char(), 10);

        let serial = SerialConfig {
            parity: Parity::Even,
            ..SerialConfig::new("tty")
        };
        assert_eq!(serial.bits_per_char(), 11);

        let serial = SerialConfig {
            data_bits: DataBits::Seven,
            stop_bits: StopBits::Two,
            ..SerialConfig::new("tty")
        };
        assert_eq!(serial.bits_per_char(), 10);
    }

    #[test]
    fn inter_frame_gap_at_low_baud_rates() {
        let serial = SerialConfig {
            baud_rate: 9_600,
            parity: Parity::Even,
            ..SerialConfig::new("tty")
        };
        // 11 bits / 9600 baud = 1145833 ns
        assert_eq!(serial.char_time(), Duration::from_nanos(1_145_833));
        assert_eq!(serial.inter_frame_gap(), Duration::from_nanos(4_010_415));

        let serial = SerialConfig {
            baud_rate: 19_200,
            ..SerialConfig::new("tty")
        };
        // 10 bits / 19200 baud = 520833 ns
        assert_eq!(serial.inter_frame_gap(), Duration::from_nanos(1_822_915));
    }

    #[test]
    fn fixed_inter_frame_gap_at_high_baud_rates() {
        let serial = SerialConfig::new("tty");
        assert_eq!(serial.inter_frame_gap(), Duration::from_micros(1_750));
    }

    #[test]
    fn derive_inter_frame_timeout() {
        let config = Config::new("tty").with_baud_rate(9_600);
        let derived = config.transaction_config().inter_frame_timeout();
        // 10 bits / 9600 baud = 1041666 ns
        assert_eq!(derived, Duration::from_nanos(3_645_831));

        let config = config.with_inter_frame_timeout(Duration::from_millis(10));
        assert_eq!(
            config.transaction_config().inter_frame_timeout(),
            Duration::from_millis(10)
        );
    }
}
