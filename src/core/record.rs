// Fixed-width nullable record layouts, streaming record reader/writer, and forward-fill decoding.
use std::io::{self, Read, Write};
use std::marker::PhantomData;

use time::{Date, Month};

use crate::core::error::{Error, ErrorKind};

pub const DATE_RECORD_LEN: usize = 5;
pub const DOUBLE_RECORD_LEN: usize = 9;
const MAX_RECORD_LEN: usize = DOUBLE_RECORD_LEN;

const FLAG_ABSENT: u8 = 0;
const FLAG_PRESENT: u8 = 1;

/// One fixed-width record layout: a presence byte followed by the value bytes.
pub trait RecordCodec {
    type Value: Copy;

    const LEN: usize;

    /// Fill `buf[..Self::LEN]`; absent values leave the value bytes zeroed.
    fn encode_into(value: Option<Self::Value>, buf: &mut [u8]);

    fn decode_from(buf: &[u8]) -> Result<Option<Self::Value>, Error>;
}

/// `[flag:1][year:u16 LE][month:1][day:1]`
#[derive(Clone, Copy, Debug)]
pub struct DateRecord;

/// `[flag:1][f64 LE:8]`
#[derive(Clone, Copy, Debug)]
pub struct DoubleRecord;

impl RecordCodec for DateRecord {
    type Value = Date;

    const LEN: usize = DATE_RECORD_LEN;

    fn encode_into(value: Option<Date>, buf: &mut [u8]) {
        buf[..Self::LEN].fill(0);
        if let Some(date) = value {
            buf[0] = FLAG_PRESENT;
            // Years outside u16 are clamped.
            let year = date.year().clamp(0, i32::from(u16::MAX)) as u16;
            buf[1..3].copy_from_slice(&year.to_le_bytes());
            buf[3] = u8::from(date.month());
            buf[4] = date.day();
        }
    }

    fn decode_from(buf: &[u8]) -> Result<Option<Date>, Error> {
        if buf[0] == FLAG_ABSENT {
            return Ok(None);
        }
        let year = u16::from_le_bytes([buf[1], buf[2]]);
        let month = Month::try_from(buf[3]).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid month {} in date record", buf[3]))
                .with_source(err)
        })?;
        Date::from_calendar_date(i32::from(year), month, buf[4])
            .map(Some)
            .map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message(format!(
                        "invalid calendar date {year:04}-{:02}-{:02} in date record",
                        buf[3], buf[4]
                    ))
                    .with_source(err)
            })
    }
}

impl RecordCodec for DoubleRecord {
    type Value = f64;

    const LEN: usize = DOUBLE_RECORD_LEN;

    fn encode_into(value: Option<f64>, buf: &mut [u8]) {
        buf[..Self::LEN].fill(0);
        if let Some(value) = value {
            buf[0] = FLAG_PRESENT;
            buf[1..9].copy_from_slice(&value.to_le_bytes());
        }
    }

    fn decode_from(buf: &[u8]) -> Result<Option<f64>, Error> {
        if buf[0] == FLAG_ABSENT {
            return Ok(None);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[1..9]);
        Ok(Some(f64::from_le_bytes(bytes)))
    }
}

pub fn encode_date(value: Option<Date>) -> [u8; DATE_RECORD_LEN] {
    let mut buf = [0u8; DATE_RECORD_LEN];
    DateRecord::encode_into(value, &mut buf);
    buf
}

pub fn encode_double(value: Option<f64>) -> [u8; DOUBLE_RECORD_LEN] {
    let mut buf = [0u8; DOUBLE_RECORD_LEN];
    DoubleRecord::encode_into(value, &mut buf);
    buf
}

pub fn decode_date(buf: &[u8; DATE_RECORD_LEN]) -> Result<Option<Date>, Error> {
    DateRecord::decode_from(buf)
}

pub fn decode_double(buf: &[u8; DOUBLE_RECORD_LEN]) -> Result<Option<f64>, Error> {
    DoubleRecord::decode_from(buf)
}

/// UTF-8 bytes of `value`, newline terminated. Blank input becomes a bare newline.
pub fn encode_text(value: &str) -> Vec<u8> {
    let value = if value.trim().is_empty() { "" } else { value };
    let mut out = Vec::with_capacity(value.len() + 1);
    out.extend_from_slice(value.as_bytes());
    if !value.ends_with('\n') {
        out.push(b'\n');
    }
    out
}

/// Streams records of one layout into a writer.
pub struct RecordWriter<W, C> {
    inner: W,
    written: u64,
    _codec: PhantomData<C>,
}

impl<W: Write, C: RecordCodec> RecordWriter<W, C> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            _codec: PhantomData,
        }
    }

    pub fn write(&mut self, value: Option<C::Value>) -> Result<(), Error> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        C::encode_into(value, &mut buf);
        self.inner.write_all(&buf[..C::LEN]).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write record")
                .with_offset(self.written * C::LEN as u64)
                .with_source(err)
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush records")
                .with_source(err)
        })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Iterates the records of one layout from a reader until clean end of stream.
///
/// A trailing partial record yields `UnexpectedEof` and ends iteration.
pub struct RecordReader<R, C> {
    inner: R,
    offset: u64,
    done: bool,
    _codec: PhantomData<C>,
}

impl<R: Read, C: RecordCodec> RecordReader<R, C> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
            _codec: PhantomData,
        }
    }

    fn read_record(&mut self) -> Result<Option<Option<C::Value>>, Error> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let record = &mut buf[..C::LEN];
        let mut filled = 0;
        while filled < record.len() {
            match self.inner.read(&mut record[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to read record")
                        .with_offset(self.offset + filled as u64)
                        .with_source(err));
                }
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < record.len() {
            return Err(Error::new(ErrorKind::UnexpectedEof)
                .with_message(format!(
                    "truncated record: {filled} of {} bytes",
                    C::LEN
                ))
                .with_offset(self.offset));
        }
        let value = C::decode_from(record).map_err(|err| err.with_offset(self.offset))?;
        self.offset += C::LEN as u64;
        Ok(Some(value))
    }
}

impl<R: Read, C: RecordCodec> Iterator for RecordReader<R, C> {
    type Item = Result<Option<C::Value>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Every record, absent ones included. Nothing is returned on a truncated stream.
pub fn decode_all<C: RecordCodec, R: Read>(reader: R) -> Result<Vec<Option<C::Value>>, Error> {
    RecordReader::<R, C>::new(reader).collect()
}

/// Dense series where absent records repeat the last present value (0.0 before the first).
pub fn decode_time_series<R: Read>(reader: R) -> Result<Vec<f64>, Error> {
    let mut last_value = 0.0;
    RecordReader::<R, DoubleRecord>::new(reader)
        .map(|record| {
            if let Some(value) = record? {
                last_value = value;
            }
            Ok(last_value)
        })
        .collect()
}

/// The most recent present value of the stream, without materializing the series.
pub fn decode_final_value<R: Read>(reader: R) -> Result<Option<f64>, Error> {
    let mut last_value = None;
    for record in RecordReader::<R, DoubleRecord>::new(reader) {
        if let Some(value) = record? {
            last_value = Some(value);
        }
    }
    Ok(last_value)
}
