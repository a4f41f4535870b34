use chronofile::engine::compressed::CompressedUniformFile;
use chronofile::engine::indexed::IndexedFile;
use chronofile::engine::uniform::UniformFile;
use chronofile::signature::{FieldDescriptor, RecordDescriptor, TypeMap};
use chronofile::{CodecKind, EngineError, FieldValue, Record};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "chronofile", version = "1.0.0", about = "Append-only time-series file engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Uniform,
    Indexed,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new file of the given kind
    Create {
        path: PathBuf,
        #[arg(long, value_enum)]
        kind: Kind,
        /// Uniform only: first timestamp, in ticks
        #[arg(long, default_value_t = 0)]
        t0: i64,
        /// Uniform only: ticks between consecutive records
        #[arg(long, default_value_t = 1)]
        delta: i64,
    },
    /// Append one or more values
    Append {
        path: PathBuf,
        #[arg(long, value_enum)]
        kind: Kind,
        /// Uniform: the ordinal to start writing at. Indexed: ignored,
        /// always appends at the end.
        #[arg(long, default_value_t = 0)]
        first_ordinal: u64,
        /// Indexed only: the index field for each value, same length as --values
        #[arg(long, value_delimiter = ',')]
        index: Vec<i64>,
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<f64>,
    },
    /// Read a contiguous ordinal range
    Read {
        path: PathBuf,
        #[arg(long, value_enum)]
        kind: Kind,
        #[arg(long, default_value_t = 0)]
        first_ordinal: u64,
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
    /// Shrink the file to `count` records
    Truncate {
        path: PathBuf,
        #[arg(long, value_enum)]
        kind: Kind,
        #[arg(long)]
        count: u64,
    },
    /// Read-only diagnostic scan; never mutates the file
    Scan { path: PathBuf },
    /// Create-if-absent, then codec-pack and append values to a
    /// compressed uniform file
    CompressedAppend {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        t0: i64,
        #[arg(long, default_value_t = 1)]
        delta: i64,
        /// MultipliedDelta multiplier applied to each value before packing
        #[arg(long, default_value_t = 10_000)]
        multiplier: i64,
        #[arg(long, default_value_t = 1)]
        divisor: i64,
        /// Declared bit width of the mapped integer; too narrow for
        /// `multiplier` and the given values fails as a codec precision loss
        #[arg(long, default_value_t = 48)]
        bits: u32,
        #[arg(long, default_value_t = 4096)]
        max_block_bytes: usize,
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<f64>,
    },
    /// Read a contiguous ordinal range out of a compressed uniform file
    CompressedRead {
        path: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        multiplier: i64,
        #[arg(long, default_value_t = 1)]
        divisor: i64,
        #[arg(long, default_value_t = 48)]
        bits: u32,
        #[arg(long, default_value_t = 4096)]
        max_block_bytes: usize,
        #[arg(long, default_value_t = 0)]
        first_ordinal: u64,
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Measurement {
    value: f64,
}

impl Record for Measurement {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("chronofile::cli::Measurement").with_field(FieldDescriptor::primitive("value", "f64"))
    }
    fn to_values(&self) -> Vec<FieldValue> {
        vec![FieldValue::F64(self.value)]
    }
    fn from_values(values: &[FieldValue]) -> Self {
        Self { value: match values[0] { FieldValue::F64(v) => v, other => other.as_i64() as f64 } }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct IndexedMeasurement {
    index: i64,
    value: f64,
}

impl Record for IndexedMeasurement {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("chronofile::cli::IndexedMeasurement")
            .with_field(FieldDescriptor::primitive("index", "i64"))
            .with_field(FieldDescriptor::primitive("value", "f64"))
            .with_index_field("index")
    }
    fn to_values(&self) -> Vec<FieldValue> {
        vec![FieldValue::I64(self.index), FieldValue::F64(self.value)]
    }
    fn from_values(values: &[FieldValue]) -> Self {
        Self {
            index: values[0].as_i64(),
            value: match values[1] { FieldValue::F64(v) => v, other => other.as_i64() as f64 },
        }
    }
    fn index_value(&self) -> Option<i64> {
        Some(self.index)
    }
}

fn main() -> ExitCode {
    chronofile::install_tracing();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::from(0),
        Err(code) => ExitCode::from(code),
    }
}

fn run(command: Commands) -> Result<(), u8> {
    match command {
        Commands::Create { path, kind, t0, delta } => match kind {
            Kind::Uniform => {
                UniformFile::<Measurement>::create(&path, t0, delta).map_err(exit_code)?;
                info!(?path, "created uniform file");
                Ok(())
            }
            Kind::Indexed => {
                IndexedFile::<IndexedMeasurement>::create(&path).map_err(exit_code)?;
                info!(?path, "created indexed file");
                Ok(())
            }
        },
        Commands::Append { path, kind, first_ordinal, index, values } => match kind {
            Kind::Uniform => {
                let (mut f, _) = UniformFile::<Measurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                let items: Vec<Measurement> = values.iter().map(|&value| Measurement { value }).collect();
                f.append(first_ordinal, &items).map_err(exit_code)?;
                f.close().map_err(exit_code)
            }
            Kind::Indexed => {
                if index.len() != values.len() {
                    return Err(2);
                }
                let (mut f, _) = IndexedFile::<IndexedMeasurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                let items: Vec<IndexedMeasurement> = index
                    .iter()
                    .zip(values.iter())
                    .map(|(&index, &value)| IndexedMeasurement { index, value })
                    .collect();
                f.append(&items).map_err(exit_code)?;
                f.close().map_err(exit_code)
            }
        },
        Commands::Read { path, kind, first_ordinal, count } => match kind {
            Kind::Uniform => {
                let (mut f, _) = UniformFile::<Measurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                let mut out = vec![Measurement::default(); count as usize];
                f.read_by_ordinal(first_ordinal, &mut out).map_err(exit_code)?;
                for m in out {
                    println!("{}", m.value);
                }
                Ok(())
            }
            Kind::Indexed => {
                let (mut f, _) = IndexedFile::<IndexedMeasurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                let mut out = vec![IndexedMeasurement::default(); count as usize];
                f.read_by_ordinal(first_ordinal, &mut out).map_err(exit_code)?;
                for m in out {
                    println!("{}\t{}", m.index, m.value);
                }
                Ok(())
            }
        },
        Commands::Truncate { path, kind, count } => match kind {
            Kind::Uniform => {
                let (mut f, _) = UniformFile::<Measurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                f.truncate(count).map_err(exit_code)?;
                f.close().map_err(exit_code)
            }
            Kind::Indexed => {
                let (mut f, _) = IndexedFile::<IndexedMeasurement>::open(&path, &TypeMap::new()).map_err(exit_code)?;
                f.truncate(count).map_err(exit_code)?;
                f.close().map_err(exit_code)
            }
        },
        Commands::Scan { path } => {
            let report = chronofile::scan(&path).map_err(|_| 5u8)?;
            println!("{:?}", report);
            Ok(())
        }
        Commands::CompressedAppend { path, t0, delta, multiplier, divisor, bits, max_block_bytes, values } => {
            let codec = CodecKind::MultipliedDelta { multiplier, divisor, bits };
            let mut f = if path.exists() {
                CompressedUniformFile::<Measurement>::open(&path, &TypeMap::new(), codec, max_block_bytes)
                    .map_err(exit_code)?
            } else {
                CompressedUniformFile::<Measurement>::create(&path, t0, delta, codec, max_block_bytes)
                    .map_err(exit_code)?
            };
            let first_ordinal = f.count();
            let items: Vec<Measurement> = values.iter().map(|&value| Measurement { value }).collect();
            f.append(first_ordinal, &items).map_err(exit_code)?;
            f.close().map_err(exit_code)
        }
        Commands::CompressedRead { path, multiplier, divisor, bits, max_block_bytes, first_ordinal, count } => {
            let codec = CodecKind::MultipliedDelta { multiplier, divisor, bits };
            let mut f = CompressedUniformFile::<Measurement>::open(&path, &TypeMap::new(), codec, max_block_bytes)
                .map_err(exit_code)?;
            for m in f.read_by_ordinal(first_ordinal, count).map_err(exit_code)? {
                println!("{}", m.value);
            }
            Ok(())
        }
    }
}

/// Maps an `EngineError` to the CLI's exit code contract: 0 success; 2
/// usage error; 3 signature mismatch; 4 version incompatible; 5 I/O short
/// transfer; 6 index misaligned/non-monotonic; 7 codec precision loss;
/// 8 header corrupt.
fn exit_code(err: EngineError) -> u8 {
    use chronofile::{CodecError, HeaderError};
    match err {
        EngineError::Header(HeaderError::SignatureMismatch) => 3,
        EngineError::Header(HeaderError::VersionIncompatible { .. }) => 4,
        EngineError::Header(HeaderError::HeaderCorrupt) => 8,
        EngineError::Header(_) => 2,
        EngineError::IoShortTransfer { .. } => 5,
        EngineError::IndexMisaligned | EngineError::IndexNonMonotonic => 6,
        EngineError::Codec(CodecError::PrecisionLoss { .. }) => 7,
        EngineError::Codec(_) => 2,
        EngineError::RecordSizeChanged
        | EngineError::TruncateGrow { .. }
        | EngineError::UseAfterDispose
        | EngineError::StateInvalid
        | EngineError::OutOfBounds { .. } => 2,
        EngineError::BlockFrameCorrupt => 8,
        EngineError::Io(_) => 5,
    }
}
