//! Debug symbol table.
//!
//! Maps instruction addresses to function names. Loaded once from a map
//! file and consulted only by diagnostics and the optional call profiler.
//!
//! Map files are plain text with one `segment address name` triple per line,
//! the address in hex. Only segment 0 (code) is kept.

use std::fmt;

/// Symbol map parse error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("symbol map line {line}: expected `segment address name`, got {text:?}")]
    Malformed { line: usize, text: String },
}

/// One named code address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// Instruction index of the function entry.
    pub address: u32,
    pub name: String,
    /// Calls recorded while profiling.
    pub call_count: u64,
}

/// Symbols ordered by address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(address, name)` pairs in any order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut symbols: Vec<Symbol> = pairs
            .into_iter()
            .map(|(address, name)| Symbol {
                address,
                name: name.into(),
                call_count: 0,
            })
            .collect();
        symbols.sort_by_key(|s| s.address);
        Self { symbols }
    }

    /// Parse a map file.
    pub fn parse_map(text: &str) -> Result<Self, SymbolError> {
        let mut pairs = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = || SymbolError::Malformed {
                line: idx + 1,
                text: raw.to_owned(),
            };

            let mut parts = line.split_whitespace();
            let (Some(segment), Some(address), Some(name), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(malformed());
            };
            let segment: u32 = segment.parse().map_err(|_| malformed())?;
            let address = u32::from_str_radix(address, 16).map_err(|_| malformed())?;

            if segment == 0 {
                pairs.push((address, name.to_owned()));
            }
        }

        let table = Self::from_pairs(pairs);
        tracing::debug!(symbols = table.len(), "loaded symbol map");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter()
    }

    /// Find a symbol by name.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Nearest symbol at or before `address`, with the distance from it.
    pub fn lookup(&self, address: u32) -> Option<(&Symbol, u32)> {
        let idx = self.symbols.partition_point(|s| s.address <= address);
        let symbol = self.symbols.get(idx.checked_sub(1)?)?;
        Some((symbol, address - symbol.address))
    }

    /// Count a call to the function starting exactly at `address`.
    pub fn record_call(&mut self, address: u32) {
        if let Ok(idx) = self.symbols.binary_search_by_key(&address, |s| s.address) {
            self.symbols[idx].call_count += 1;
        }
    }

    /// Display adapter naming `address` as `name` or `name+0xoff`.
    pub fn describe(&self, address: u32) -> Describe<'_> {
        Describe {
            table: self,
            address,
        }
    }
}

/// See [`SymbolTable::describe`].
pub struct Describe<'a> {
    table: &'a SymbolTable,
    address: u32,
}

impl fmt::Display for Describe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table.lookup(self.address) {
            Some((symbol, 0)) => write!(f, "{}", symbol.name),
            Some((symbol, offset)) => write!(f, "{}+{:#x}", symbol.name, offset),
            None => write!(f, "{}", self.address),
        }
    }
}
