//! Scripted I2C bus for unit tests.
//!
//! Each transaction consumes one step from the script: either a fault or the
//! bytes to hand back. Transactions beyond the script succeed and read zeros.
//! Every attempted transaction is recorded, including failed ones.

use std::collections::VecDeque;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError(pub ErrorKind);

impl i2c::Error for MockError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write { addr: u8, bytes: Vec<u8> },
    Read { addr: u8, len: usize },
    WriteRead { addr: u8, write: Vec<u8>, read_len: usize },
}

enum Step {
    Fail(ErrorKind),
    Respond(Vec<u8>),
}

#[derive(Default)]
pub struct MockBus {
    script: VecDeque<Step>,
    ops: Vec<Op>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, kind: ErrorKind) -> Self {
        self.script.push_back(Step::Fail(kind));
        self
    }

    pub fn respond(mut self, bytes: &[u8]) -> Self {
        self.script.push_back(Step::Respond(bytes.to_vec()));
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }
}

impl ErrorType for MockBus {
    type Error = MockError;
}

impl I2c<SevenBitAddress> for MockBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let op = match operations {
            [Operation::Write(w)] => Op::Write {
                addr: address,
                bytes: w.to_vec(),
            },
            [Operation::Read(r)] => Op::Read {
                addr: address,
                len: r.len(),
            },
            [Operation::Write(w), Operation::Read(r)] => Op::WriteRead {
                addr: address,
                write: w.to_vec(),
                read_len: r.len(),
            },
            _ => panic!("unexpected operation sequence"),
        };
        self.ops.push(op);

        let response = match self.script.pop_front() {
            Some(Step::Fail(kind)) => return Err(MockError(kind)),
            Some(Step::Respond(bytes)) => bytes,
            None => Vec::new(),
        };

        if let Some(Operation::Read(buf)) = operations.last_mut() {
            buf.fill(0);
            let n = buf.len().min(response.len());
            buf[..n].copy_from_slice(&response[..n]);
        }

        Ok(())
    }
}
