//! CRC-32 engine used to frame bus messages
//!
//! Non-reflected (MSB-first), table-driven, with an all-ones initial register
//! and an all-ones output XOR. Polynomials are written in explicit-top-bit
//! notation: `0x1F1922815` is the degree-32 polynomial whose normal form is
//! `0xF1922815`.
//!
//! The lookup table can be derived four ways; all four must agree entry for
//! entry, and [`check_conformance`] verifies that they do.

use std::fmt;

use crc_any::CRCu32;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// 256-entry lookup table
pub type CrcTable = [u32; 256];

/// Initial register value
pub const INITIAL_REGISTER: u32 = 0xFFFF_FFFF;

/// Output XOR mask
pub const XOR_OUTPUT: u32 = 0xFFFF_FFFF;

/// Reference message buffer from the generated message-handling unit test
pub const REFERENCE_BUFFER: [u8; 98] = [
    0x0E, 0x00, 0x90, 0x9E, 0x12, 0x26, 0x00, 0x00, 0xF0, 0x41, //
    0x00, 0x00, 0xA0, 0x41, 0x00, 0x00, 0x04, 0x42, 0x00, 0x00, //
    0x60, 0x42, 0x00, 0x00, 0xEC, 0x41, 0xCD, 0xCC, 0xF8, 0x41, //
    0x00, 0x00, 0x00, 0x42, 0x00, 0x00, 0x0C, 0x42, 0x00, 0x00, //
    0xC8, 0x42, 0x00, 0x00, 0xCA, 0x42, 0x00, 0x00, 0x48, 0x43, //
    0x00, 0x00, 0x52, 0x43, 0x00, 0x00, 0x80, 0x3F, 0x9A, 0x99, //
    0x99, 0x3F, 0x00, 0x00, 0x94, 0x41, 0x66, 0x66, 0x3E, 0x41, //
    0x00, 0x00, 0x48, 0x41, 0x33, 0x33, 0x23, 0x41, 0x00, 0x00, //
    0x60, 0x41, 0x00, 0x00, 0x80, 0x41, 0x00, 0x00, 0x88, 0x41, //
    0x00, 0x00, 0x90, 0x41, 0x00, 0x00, 0x98, 0x41,
];

/// Checksum of [`REFERENCE_BUFFER`] for [`Polynomial::DEFAULT`]
pub const REFERENCE_CHECKSUM: u32 = 0x1CF9_2F07;

/// A degree-32 generator polynomial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Polynomial {
    explicit: u64,
}

impl Polynomial {
    /// `0x1F1922815`
    pub const DEFAULT: Polynomial = Polynomial {
        explicit: 0x1_F192_2815,
    };

    /// Parse explicit-top-bit hex notation (`0x1F1922815`)
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || CompileError::InvalidPolynomial(text.to_string());
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or_else(invalid)?;
        if digits.len() != 9 || !digits.starts_with('1') {
            return Err(invalid());
        }
        let explicit = u64::from_str_radix(digits, 16).map_err(|_| invalid())?;
        Self::from_explicit(explicit).map_err(|_| invalid())
    }

    /// Polynomial from its 33-bit explicit form; bit 32 must be set
    pub fn from_explicit(explicit: u64) -> Result<Self> {
        if explicit >> 32 != 1 {
            return Err(CompileError::InvalidPolynomial(format!("0x{:X}", explicit)));
        }
        Ok(Self { explicit })
    }

    /// The 33-bit explicit form
    pub fn explicit(&self) -> u64 {
        self.explicit
    }

    /// The normal form, without the implicit top bit
    pub fn normal(&self) -> u32 {
        (self.explicit & 0xFFFF_FFFF) as u32
    }
}

impl Default for Polynomial {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.explicit)
    }
}

impl std::str::FromStr for Polynomial {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Polynomial {
    type Error = CompileError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Polynomial> for String {
    fn from(poly: Polynomial) -> Self {
        poly.to_string()
    }
}

/// Ways to derive the lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableMethod {
    /// Bit simulation with a conditional XOR
    Conditional,
    /// Bit simulation using the negated top bit as an XOR mask
    Masked,
    /// 64-bit register reduced by the 33-bit explicit polynomial
    ExplicitTopBit,
    /// Single-byte checksums from the `crc-any` crate
    Library,
}

impl TableMethod {
    pub const ALL: [TableMethod; 4] = [
        TableMethod::Conditional,
        TableMethod::Masked,
        TableMethod::ExplicitTopBit,
        TableMethod::Library,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableMethod::Conditional => "conditional",
            TableMethod::Masked => "masked",
            TableMethod::ExplicitTopBit => "explicit-top-bit",
            TableMethod::Library => "library",
        }
    }
}

impl fmt::Display for TableMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the lookup table for `poly` with `method`
pub fn generate_table(poly: Polynomial, method: TableMethod) -> CrcTable {
    match method {
        TableMethod::Conditional => table_from(|byte| conditional_entry(poly.normal(), byte)),
        TableMethod::Masked => table_from(|byte| masked_entry(poly.normal(), byte)),
        TableMethod::ExplicitTopBit => table_from(|byte| explicit_top_bit_entry(poly.explicit(), byte)),
        TableMethod::Library => library_table(poly),
    }
}

fn table_from(mut entry: impl FnMut(u8) -> u32) -> CrcTable {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = entry(i as u8);
    }
    table
}

fn conditional_entry(normal: u32, byte: u8) -> u32 {
    let mut crc = (byte as u32) << 24;
    for _ in 0..8 {
        crc = if crc & 0x8000_0000 != 0 {
            (crc << 1) ^ normal
        } else {
            crc << 1
        };
    }
    crc
}

fn masked_entry(normal: u32, byte: u8) -> u32 {
    let mut crc = (byte as u32) << 24;
    for _ in 0..8 {
        crc = (crc << 1) ^ ((crc >> 31).wrapping_neg() & normal);
    }
    crc
}

// 33-bit register, reduced by the polynomial with its top bit present
fn explicit_top_bit_entry(explicit: u64, byte: u8) -> u32 {
    let mut register = (byte as u64) << 24;
    for _ in 0..8 {
        register <<= 1;
        if register & (1 << 32) != 0 {
            register ^= explicit;
        }
    }
    register as u32
}

// one-byte digests with zero init and no output xor are the raw table entries
fn library_table(poly: Polynomial) -> CrcTable {
    let mut crc = CRCu32::create_crc(poly.normal(), 32, 0, 0, false);
    table_from(|byte| {
        crc.reset();
        crc.digest(&[byte]);
        crc.get_crc()
    })
}

/// Table-driven CRC-32
#[derive(Debug, Clone)]
pub struct Crc32 {
    table: CrcTable,
    register: u32,
}

impl Crc32 {
    pub fn new(poly: Polynomial) -> Self {
        Self::with_table(generate_table(poly, TableMethod::Masked))
    }

    pub fn with_table(table: CrcTable) -> Self {
        Self {
            table,
            register: INITIAL_REGISTER,
        }
    }

    pub fn table(&self) -> &CrcTable {
        &self.table
    }

    /// One-shot checksum; does not touch the streaming state
    pub fn checksum(&self, data: &[u8]) -> u32 {
        self.fold(INITIAL_REGISTER, data) ^ XOR_OUTPUT
    }

    pub fn update(&mut self, data: &[u8]) {
        self.register = self.fold(self.register, data);
    }

    pub fn finalize(&self) -> u32 {
        self.register ^ XOR_OUTPUT
    }

    pub fn reset(&mut self) {
        self.register = INITIAL_REGISTER;
    }

    fn fold(&self, register: u32, data: &[u8]) -> u32 {
        data.iter().fold(register, |crc, &b| {
            let index = ((crc >> 24) ^ b as u32) & 0xFF;
            (crc << 8) ^ self.table[index as usize]
        })
    }
}

/// Table and checksum produced by one method
#[derive(Debug, Clone)]
pub struct MethodResult {
    pub method: TableMethod,
    pub table: CrcTable,
    pub checksum: u32,
}

/// Cross-method agreement for one polynomial and input
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub polynomial: Polynomial,
    pub results: Vec<MethodResult>,
    /// Pairs of methods whose tables differ
    pub table_mismatches: Vec<(TableMethod, TableMethod)>,
    /// Pairs of methods whose checksums differ
    pub checksum_mismatches: Vec<(TableMethod, TableMethod)>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.table_mismatches.is_empty() && self.checksum_mismatches.is_empty()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "poly = {}", self.polynomial)?;
        writeln!(f, "initial crc = 0x{:08X}", INITIAL_REGISTER)?;
        writeln!(f, "XOR output = 0x{:08X}", XOR_OUTPUT)?;
        for result in &self.results {
            writeln!(f, "  {:<17} crc = 0x{:08X}", result.method, result.checksum)?;
        }
        for (a, b) in &self.table_mismatches {
            writeln!(f, "Error! Table for {} and {} do not match!", a, b)?;
        }
        for (a, b) in &self.checksum_mismatches {
            writeln!(f, "Error! {} crc does not match {}", a, b)?;
        }
        if self.is_conformant() {
            writeln!(f, "All generated tables and CRC calculations are consistent")?;
        }
        Ok(())
    }
}

/// Derive the table with every method and checksum `data` with each
pub fn check_conformance(poly: Polynomial, data: &[u8]) -> ConformanceReport {
    let results: Vec<MethodResult> = TableMethod::ALL
        .iter()
        .map(|&method| {
            let table = generate_table(poly, method);
            let checksum = Crc32::with_table(table).checksum(data);
            MethodResult {
                method,
                table,
                checksum,
            }
        })
        .collect();

    let mut table_mismatches = Vec::new();
    let mut checksum_mismatches = Vec::new();
    for (i, a) in results.iter().enumerate() {
        for b in &results[i + 1..] {
            if a.table != b.table {
                table_mismatches.push((a.method, b.method));
            }
            if a.checksum != b.checksum {
                checksum_mismatches.push((a.method, b.method));
            }
        }
    }

    ConformanceReport {
        polynomial: poly,
        results,
        table_mismatches,
        checksum_mismatches,
    }
}

/// The C++ `kCrc32LookupTable_` definition for `table`
pub fn render_cpp_table(poly: Polynomial, table: &CrcTable) -> String {
    let mut output = String::new();
    output.push_str("\t/// @brief this table was generated with crc-util via:\n");
    output.push_str(&format!("\t///        crc-util --poly {} --gen-table\n", poly));
    output.push_str(&format!("\t/// @note crc32 lookup table for polynomial {}\n", poly));
    output.push_str("\tstatic constexpr uint32_t kCrc32LookupTable_[256] = {\n");

    let rows = table.chunks(8).count();
    for (i, row) in table.chunks(8).enumerate() {
        let entries: Vec<String> = row.iter().map(|v| format!("0x{:08X}", v)).collect();
        output.push_str("\t\t");
        output.push_str(&entries.join(", "));
        output.push_str(if i + 1 == rows { "};\n" } else { ",\n" });
    }
    output
}
