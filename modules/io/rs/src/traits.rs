use eyre::Result;

/// A trait for reading structured records. Modeled after the `Read` trait in the std.
pub trait ReadRecord {
    type Record;

    /// Read a single record into the provided buffer.
    /// Returns `true` if a record was read and `false` if the end of the input was reached.
    fn read_record(&mut self, into: &mut Self::Record) -> Result<bool>;

    /// Read all remaining records, appending them to `into`. Returns the number of records read.
    fn read_to_end(&mut self, into: &mut Vec<Self::Record>) -> Result<usize>
    where
        Self::Record: Default,
    {
        let mut total = 0;
        loop {
            let mut record = Self::Record::default();
            if !self.read_record(&mut record)? {
                return Ok(total);
            }
            into.push(record);
            total += 1;
        }
    }
}

/// A trait for writing structured records. Modeled after the `Write` trait in the std.
pub trait WriteRecord {
    type Record;

    fn write_record(&mut self, record: &Self::Record) -> Result<()>;

    fn write_records<'a>(&mut self, records: impl IntoIterator<Item = &'a Self::Record>) -> Result<()>
    where
        Self::Record: 'a,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()>;
}
