//! The I2C bus inside the remote connecting the speaker, the IR camera and the extension port.

/// A peripheral answering reads and writes on the remote's I2C bus.
pub trait I2cSlave {
    /// Reads `out.len()` bytes starting at register `addr`.
    /// Returns the number of bytes actually produced, zero if the slave does not answer.
    fn bus_read(&mut self, slave_addr: u8, addr: u8, out: &mut [u8]) -> usize;

    /// Writes `data` starting at register `addr`, returns the number of bytes accepted.
    fn bus_write(&mut self, slave_addr: u8, addr: u8, data: &[u8]) -> usize;
}

/// Borrowed view of the slaves currently reachable on the bus.
///
/// Slaves are asked in the order they were added. A slave answering a non-zero count
/// claims the transfer, so a device on the extension port can shadow an address.
#[derive(Default)]
pub struct I2cBus<'a> {
    slaves: Vec<&'a mut dyn I2cSlave>,
}

impl<'a> I2cBus<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self { slaves: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.slaves.clear();
    }

    pub fn add_slave(&mut self, slave: &'a mut dyn I2cSlave) {
        self.slaves.push(slave);
    }

    #[must_use]
    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn bus_read(&mut self, slave_addr: u8, addr: u8, out: &mut [u8]) -> usize {
        tracing::trace!(slave_addr, addr, size = out.len(), "i2c read");
        self.slaves
            .iter_mut()
            .map(|slave| slave.bus_read(slave_addr, addr, out))
            .find(|&count| count != 0)
            .unwrap_or(0)
    }

    pub fn bus_write(&mut self, slave_addr: u8, addr: u8, data: &[u8]) -> usize {
        tracing::trace!(slave_addr, addr, size = data.len(), "i2c write");
        self.slaves
            .iter_mut()
            .map(|slave| slave.bus_write(slave_addr, addr, data))
            .find(|&count| count != 0)
            .unwrap_or(0)
    }
}

/// A flat 256 byte register file with auto-incrementing access, as used by most slaves.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterBlock {
    data: [u8; 0x100],
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self { data: [0u8; 0x100] }
    }
}

impl std::fmt::Debug for RegisterBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterBlock").finish_non_exhaustive()
    }
}

impl RegisterBlock {
    /// Reads up to the end of the block, returns the number of bytes read.
    pub fn read(&self, addr: u8, out: &mut [u8]) -> usize {
        let start = usize::from(addr);
        let size = out.len().min(self.data.len() - start);
        out[..size].copy_from_slice(&self.data[start..start + size]);
        size
    }

    /// Writes up to the end of the block, returns the number of bytes written.
    pub fn write(&mut self, addr: u8, data: &[u8]) -> usize {
        let start = usize::from(addr);
        let size = data.len().min(self.data.len() - start);
        self.data[start..start + size].copy_from_slice(&data[..size]);
        size
    }

    #[must_use]
    pub fn get(&self, addr: u8) -> u8 {
        self.data[usize::from(addr)]
    }

    pub fn set(&mut self, addr: u8, value: u8) {
        self.data[usize::from(addr)] = value;
    }

    #[must_use]
    pub fn slice(&self, addr: u8, size: usize) -> &[u8] {
        let start = usize::from(addr);
        &self.data[start..(start + size).min(self.data.len())]
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
