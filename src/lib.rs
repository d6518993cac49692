//! A driver for the Texas Instruments ADS1256 24-bit delta-sigma
//! analog-to-digital converter, built on the `embedded-hal` traits.
//!
//! The device sits on an SPI bus (mode 1, MSB first) with a dedicated
//! chip-select line, an active-low reset line, and a DRDY line that pulses
//! at the end of every conversion. Route the DRDY edge interrupt to a
//! shared [`DataReady`] latch; every transaction the driver performs waits
//! on that latch before clocking the bus.

#![cfg_attr(not(test), no_std)]

mod config;
mod data_ready;
mod registers;

pub use config::{Config, DataRate, Gain};
pub use data_ready::DataReady;
pub use registers::{mux, Command, Register};

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;
use registers::{IDLE, NOP, RREG, WREG};

/// Driver errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error<SPI, PIN> {
    /// An SPI transfer failed.
    Spi(SPI),
    /// Driving the chip-select or reset line failed.
    Pin(PIN),
    /// The device did not signal data ready within the configured bound.
    Timeout,
    /// An average of zero samples was requested.
    NoSamples,
}

/// A driver for the ADS1256 analog-to-digital converter.
///
/// # Examples
///
/// ```
/// use ads1256::{Ads1256, Config, DataReady};
/// # use embedded_hal_mock::delay::MockNoop;
/// # use embedded_hal_mock::pin::Mock as PinMock;
/// # use embedded_hal_mock::spi::Mock as SpiMock;
/// #
/// # let spi = SpiMock::new(&[]);
/// # let cs = PinMock::new(&[]);
/// # let rst = PinMock::new(&[]);
///
/// static DATA_READY: DataReady = DataReady::new();
///
/// let adc = Ads1256::new(spi, cs, rst, &DATA_READY, MockNoop::new(), Config::default());
/// ```
#[derive(Debug)]
pub struct Ads1256<'d, SPI, CS, RST, D> {
    spi: SPI,
    cs: CS,
    rst: RST,
    delay: D,
    data_ready: &'d DataReady,
    gain: Gain,
    data_rate: DataRate,
    bits_per_volt: f64,
    drdy_timeout_us: Option<u32>,
    last_reading: f64,
    output_voltage: f32,
    output_current: f32,
}

impl<'d, SPI, CS, RST, D, E, P> Ads1256<'d, SPI, CS, RST, D>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin<Error = P>,
    RST: OutputPin<Error = P>,
    D: DelayUs<u32> + DelayMs<u32>,
{
    /// Creates a driver from the SPI bus, the chip-select and reset pins,
    /// the latch fed by the DRDY interrupt, and a delay provider.
    ///
    /// Performs no bus traffic; call [`init`](Ads1256::init) to bring the
    /// device up.
    pub fn new(
        spi: SPI,
        cs: CS,
        rst: RST,
        data_ready: &'d DataReady,
        delay: D,
        config: Config,
    ) -> Self {
        Ads1256 {
            spi,
            cs,
            rst,
            delay,
            data_ready,
            gain: config.gain,
            data_rate: config.data_rate,
            bits_per_volt: config.bits_per_volt(),
            drdy_timeout_us: config.drdy_timeout_us,
            last_reading: 0.0,
            output_voltage: 0.0,
            output_current: 0.0,
        }
    }

    /// Resets and configures the device.
    ///
    /// Holds the reset line low, waits for the oscillator to start, issues
    /// RESET and SDATAC over the bus, programs the multiplexer, gain and
    /// data-rate registers in that order, and finishes with a
    /// self-calibration. The settling delays between the steps are the
    /// datasheet minimums; shortening them risks corrupted traffic.
    pub fn init(&mut self) -> Result<(), Error<E, P>> {
        self.rst.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(10);
        self.rst.set_high().map_err(Error::Pin)?;
        // Oscillator start-up.
        self.delay.delay_ms(1000);

        self.soft_reset()?;
        self.delay.delay_ms(2000);

        self.write_register(Register::Mux, mux::RESET)?;
        self.write_register(Register::Adcon, self.gain as u8)?;
        self.write_register(Register::Drate, self.data_rate as u8)?;
        self.delay.delay_ms(2000);

        self.send_command(Command::Selfcal)?;
        self.delay.delay_ms(5);

        Ok(())
    }

    /// Writes an 8-bit configuration register.
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E, P>> {
        self.wait_ready()?;
        self.select()?;
        let written = self.write_register_selected(register, value);
        let deselect = self.deselect();
        written?;
        deselect
    }

    /// Reads back an 8-bit configuration register.
    pub fn read_register(&mut self, register: Register) -> Result<u8, Error<E, P>> {
        self.wait_ready()?;
        self.select()?;
        let read = self.read_register_selected(register);
        let deselect = self.deselect();
        let value = read?;
        deselect?;
        Ok(value)
    }

    /// Issues a single-byte command.
    pub fn send_command(&mut self, command: Command) -> Result<(), Error<E, P>> {
        self.wait_ready()?;
        self.select()?;
        let sent = self.command_selected(command);
        let deselect = self.deselect();
        sent?;
        deselect
    }

    /// Acquires one conversion from `channel` and returns it in volts.
    ///
    /// `channel` is the raw selector byte written to the multiplexer
    /// register; see [`mux::single_ended`]. The selector is not validated:
    /// the device leaves the behaviour of unsupported pairings undefined.
    ///
    /// The channel change, the SYNC/WAKEUP pair that applies it, and the
    /// read-out all happen inside one chip-select window, and the result
    /// becomes the most recent reading.
    pub fn read_channel(&mut self, channel: u8) -> Result<f64, Error<E, P>> {
        self.wait_ready()?;
        self.select()?;
        let acquired = self.acquire_selected(channel);
        let deselect = self.deselect();
        let code = acquired?;
        deselect?;

        let volts = f64::from(code) / self.bits_per_volt;
        self.last_reading = volts;
        Ok(volts)
    }

    /// Averages `samples` sequential conversions from `channel`.
    ///
    /// The device supports a single conversion in flight, so the samples
    /// are taken back to back, each gated on its own data-ready edge. The
    /// mean becomes the most recent reading. Requesting zero samples
    /// returns [`Error::NoSamples`].
    pub fn average_reading(&mut self, samples: u32, channel: u8) -> Result<f64, Error<E, P>> {
        if samples == 0 {
            return Err(Error::NoSamples);
        }

        let mut total = 0.0;
        for _ in 0..samples {
            total += self.read_channel(channel)?;
        }

        let mean = total / f64::from(samples);
        self.last_reading = mean;
        Ok(mean)
    }

    /// The most recent decoded reading, in volts.
    pub fn last_reading(&self) -> f64 {
        self.last_reading
    }

    /// The last latched output voltage. Never triggers an acquisition.
    pub fn voltage(&self) -> f32 {
        self.output_voltage
    }

    /// Latches an output voltage computed by the application.
    pub fn set_voltage(&mut self, volts: f32) {
        self.output_voltage = volts;
    }

    /// The last latched output current. Never triggers an acquisition.
    pub fn current(&self) -> f32 {
        self.output_current
    }

    /// Latches an output current computed by the application.
    pub fn set_current(&mut self, amps: f32) {
        self.output_current = amps;
    }

    /// Destroys the driver and returns the bus, the pins and the delay
    /// provider.
    pub fn free(self) -> (SPI, CS, RST, D) {
        (self.spi, self.cs, self.rst, self.delay)
    }

    /// Blocks until the DRDY latch reports a completed conversion.
    ///
    /// With no timeout configured this spins indefinitely; otherwise the
    /// latch is polled once per microsecond up to the bound.
    fn wait_ready(&mut self) -> Result<(), Error<E, P>> {
        match self.drdy_timeout_us {
            None => {
                self.data_ready.wait();
                Ok(())
            }
            Some(timeout_us) => {
                let mut waited = 0;
                loop {
                    if self.data_ready.poll().is_ok() {
                        return Ok(());
                    }
                    if waited >= timeout_us {
                        return Err(Error::Timeout);
                    }
                    self.delay.delay_us(1);
                    waited += 1;
                }
            }
        }
    }

    fn select(&mut self) -> Result<(), Error<E, P>> {
        self.cs.set_low().map_err(Error::Pin)
    }

    fn deselect(&mut self) -> Result<(), Error<E, P>> {
        self.cs.set_high().map_err(Error::Pin)
    }

    /// RESET followed by SDATAC, so that later register traffic is not
    /// trampled by continuous read-out. Issued blind: DRDY is not
    /// monitored during reset.
    fn soft_reset(&mut self) -> Result<(), Error<E, P>> {
        self.select()?;
        let reset = self.soft_reset_selected();
        let deselect = self.deselect();
        reset?;
        deselect
    }

    fn soft_reset_selected(&mut self) -> Result<(), Error<E, P>> {
        self.delay.delay_us(10);
        self.spi
            .write(&[Command::Reset as u8])
            .map_err(Error::Spi)?;
        self.delay.delay_ms(2);
        self.spi
            .write(&[Command::Sdatac as u8])
            .map_err(Error::Spi)?;
        self.delay.delay_us(100);
        Ok(())
    }

    fn write_register_selected(&mut self, register: Register, value: u8) -> Result<(), Error<E, P>> {
        self.delay.delay_us(7);
        // Zero byte-count field: exactly one register.
        self.spi
            .write(&[WREG | register as u8, 0x00])
            .map_err(Error::Spi)?;
        self.delay.delay_us(7);
        self.spi.write(&[value]).map_err(Error::Spi)?;
        self.delay.delay_us(7);
        Ok(())
    }

    fn read_register_selected(&mut self, register: Register) -> Result<u8, Error<E, P>> {
        self.delay.delay_us(7);
        self.spi
            .write(&[RREG | register as u8, 0x00])
            .map_err(Error::Spi)?;
        self.delay.delay_us(7);
        let mut value = [IDLE];
        self.spi.transfer(&mut value).map_err(Error::Spi)?;
        self.delay.delay_us(7);
        Ok(value[0])
    }

    fn command_selected(&mut self, command: Command) -> Result<(), Error<E, P>> {
        self.delay.delay_us(10);
        self.spi.write(&[command as u8]).map_err(Error::Spi)?;
        self.delay.delay_us(10);
        Ok(())
    }

    /// The acquisition sequence proper, run with the device selected:
    /// multiplexer write, SYNC/WAKEUP to apply it, RDATA, then three data
    /// bytes clocked out MSB first.
    fn acquire_selected(&mut self, channel: u8) -> Result<i32, Error<E, P>> {
        self.delay.delay_us(5);
        // The multiplexer write is framed inline so the channel change and
        // the conversion restart share this chip-select window.
        self.spi
            .write(&[WREG | Register::Mux as u8, 0x00, channel])
            .map_err(Error::Spi)?;
        self.delay.delay_us(5);
        self.spi.write(&[Command::Sync as u8]).map_err(Error::Spi)?;
        self.delay.delay_us(5);
        self.spi
            .write(&[Command::Wakeup as u8])
            .map_err(Error::Spi)?;
        self.delay.delay_us(1);
        self.spi.write(&[Command::Rdata as u8]).map_err(Error::Spi)?;
        self.delay.delay_us(7);

        let mut raw = [NOP; 3];
        self.spi.transfer(&mut raw).map_err(Error::Spi)?;
        Ok(sign_extend(raw))
    }
}

/// Reassembles three big-endian bytes into a signed 24-bit sample.
///
/// Values above 0x7FFFFF have the sign bit of the 24-bit two's-complement
/// representation set and are shifted down by 2^24.
fn sign_extend(raw: [u8; 3]) -> i32 {
    let value = u32::from_be_bytes([0, raw[0], raw[1], raw[2]]);
    if value > 0x7F_FFFF {
        value as i32 - 0x0100_0000
    } else {
        value as i32
    }
}
