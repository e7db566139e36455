use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AddressError, RosterError};

/// Spreadsheet column letters, stored upper case (`C`, `AB`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnKey(String);

impl ColumnKey {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AddressError::InvalidColumn(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ColumnKey {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ColumnKey> for String {
    fn from(value: ColumnKey) -> Self {
        value.0
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1-based spreadsheet row holding today's lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRow(pub u32);

impl fmt::Display for SessionRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub display_name: String,
    pub column: ColumnKey,
}

impl Student {
    pub fn new(display_name: impl Into<String>, column: &str) -> Result<Self, AddressError> {
        Ok(Self {
            display_name: display_name.into(),
            column: ColumnKey::parse(column)?,
        })
    }
}

/// Ordered, non-empty list of students. Order defines the scroll order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Result<Self, RosterError> {
        if students.is_empty() {
            return Err(RosterError::Empty);
        }

        for (position, student) in students.iter().enumerate() {
            if student.display_name.trim().is_empty() {
                return Err(RosterError::EmptyName { position });
            }
            if let Some(earlier) = students[..position]
                .iter()
                .find(|other| other.column == student.column)
            {
                return Err(RosterError::DuplicateColumn {
                    column: student.column.to_string(),
                    first: earlier.display_name.clone(),
                    second: student.display_name.clone(),
                });
            }
        }

        Ok(Self { students })
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Student> {
        self.students.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Student> {
        let name = name.trim();
        self.students
            .iter()
            .find(|student| student.display_name.eq_ignore_ascii_case(name))
    }
}

/// One attendance cell, rendered as `<column><row>` (`D5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub column: ColumnKey,
    pub row: SessionRow,
}

impl CellAddress {
    pub fn new(column: ColumnKey, row: SessionRow) -> Self {
        Self { column, row }
    }

    pub fn for_student(student: &Student, row: SessionRow) -> Self {
        Self::new(student.column.clone(), row)
    }

    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        let (column, row) = split_cell(raw)?;
        let row = row.ok_or_else(|| AddressError::InvalidRow(raw.to_string()))?;
        Ok(Self::new(column, SessionRow(row)))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Contiguous single-column range: `A1:A66`, `A:A`, `A2:A` or a single cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRange {
    pub column: ColumnKey,
    pub first_row: u32,
    pub last_row: Option<u32>,
}

impl ColumnRange {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }

        let (start, end) = match raw.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (raw, None),
        };

        let (column, first_row) = split_cell(start)?;
        let first_row = first_row.unwrap_or(1);

        let last_row = match end {
            None => Some(first_row),
            Some(end) => {
                let (end_column, last_row) = split_cell(end)?;
                if end_column != column {
                    return Err(AddressError::MixedColumns(raw.to_string()));
                }
                last_row
            }
        };

        if matches!(last_row, Some(last) if last < first_row) {
            return Err(AddressError::Inverted(raw.to_string()));
        }

        Ok(Self {
            column,
            first_row,
            last_row,
        })
    }

    pub fn single(address: &CellAddress) -> Self {
        Self {
            column: address.column.clone(),
            first_row: address.row.0,
            last_row: Some(address.row.0),
        }
    }
}

impl fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_row {
            Some(last) if last == self.first_row => write!(f, "{}{}", self.column, last),
            Some(last) => write!(f, "{0}{1}:{0}{2}", self.column, self.first_row, last),
            None if self.first_row == 1 => write!(f, "{0}:{0}", self.column),
            None => write!(f, "{0}{1}:{0}", self.column, self.first_row),
        }
    }
}

fn split_cell(raw: &str) -> Result<(ColumnKey, Option<u32>), AddressError> {
    let raw = raw.trim();
    let digits_at = raw
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (letters, digits) = raw.split_at(digits_at);
    let column = ColumnKey::parse(letters)?;

    if digits.is_empty() {
        return Ok((column, None));
    }

    match digits.parse::<u32>() {
        Ok(row) if row > 0 => Ok((column, Some(row))),
        _ => Err(AddressError::InvalidRow(raw.to_string())),
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
