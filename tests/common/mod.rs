//! Indexed BAM, bgzipped VCF and BCF fixtures for end-to-end tests.
//!
//! Files are written with the noodles writers. Each group of records is
//! flushed into its own BGZF block so block offsets are known, and every
//! record's chunk is fed to the matching noodles indexer. Decoders read
//! served bytes back through the noodles readers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use htsget_slice::{
    auth::{AllowAll, AuthConfig, Authorizer, UrlSigner},
    handlers::{AppState, create_router},
    index::{IndexCache, IndexProvider},
    planner::PlanOptions,
    storage::{ByteRange, DataFile, DataSource, IndexFile, LocalStorage, Storage},
    ticket::DataUrlResolver,
    types::Format,
};
use noodles::bam::{self, bai};
use noodles::bcf;
use noodles::bgzf::{self, VirtualPosition};
use noodles::core::Position;
use noodles::csi::{
    self,
    binning_index::{
        Indexer,
        index::{
            header,
            reference_sequence::{
                bin::Chunk,
                index::{BinnedIndex, LinearIndex},
            },
        },
    },
};
use noodles::sam::{
    self,
    alignment::{
        RecordBuf,
        io::Write as _,
        record::{
            Flags,
            cigar::{Op, op::Kind},
        },
    },
};
use noodles::tabix;
use noodles::vcf::{self, variant::io::Write as _};
use std::io::Write as _;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub use htsget_slice::formats::bgzf::EOF_MARKER;

pub const BASE_URL: &str = "http://localhost:8080";

pub const REFERENCES: [&str; 2] = ["chr1", "chr2"];

const READ_LEN: usize = 50;
const GROUP_LEN: usize = 20;

type Context = Option<(usize, Position, Position, bool)>;

/// Reaches the BGZF stream under a format writer.
type BlockOf<T> = fn(&mut T) -> &mut bgzf::Writer<Vec<u8>>;

type BamWriter = bam::io::Writer<bgzf::Writer<Vec<u8>>>;

/// A BGZF data file plus what its indexes are built from.
pub struct Fixture {
    pub bytes: Vec<u8>,
    /// Block starts: 0 for the header, one per record group, then the EOF
    /// marker.
    pub offsets: Vec<u64>,
    records: Vec<(Context, Chunk)>,
}

impl Fixture {
    /// Start of the EOF marker.
    pub fn data_end(&self) -> u64 {
        *self.offsets.last().unwrap()
    }

    pub fn slice(&self, range: std::ops::Range<u64>) -> &[u8] {
        &self.bytes[range.start as usize..range.end as usize]
    }

    fn index_with<I>(&self, mut indexer: Indexer<I>) -> csi::binning_index::Index<I>
    where
        I: csi::binning_index::index::reference_sequence::Index + Default,
    {
        for (context, chunk) in &self.records {
            indexer.add_record(*context, *chunk).unwrap();
        }
        indexer.build(REFERENCES.len())
    }

    pub fn bai(&self) -> Vec<u8> {
        let index = self.index_with(Indexer::<LinearIndex>::default());
        let mut writer = bai::io::Writer::new(Vec::new());
        writer.write_index(&index).unwrap();
        writer.into_inner()
    }

    pub fn csi(&self) -> Vec<u8> {
        let index = self.index_with(Indexer::<BinnedIndex>::new(14, 5));
        let mut writer = csi::io::Writer::new(Vec::new());
        writer.write_index(&index).unwrap();
        writer.into_inner().finish().unwrap()
    }

    pub fn tbi(&self) -> Vec<u8> {
        let mut indexer = tabix::index::Indexer::default();
        indexer.set_header(header::Builder::vcf().build());
        for (context, chunk) in &self.records {
            let (id, start, end, _) = context.unwrap();
            indexer
                .add_record(REFERENCES[id], start, end, *chunk)
                .unwrap();
        }

        let mut writer = tabix::io::Writer::new(Vec::new());
        writer.write_index(&indexer.build()).unwrap();
        writer.into_inner().finish().unwrap()
    }
}

fn position(n: usize) -> Position {
    Position::try_from(n).unwrap()
}

/// Records one chunk per record and one block per group.
struct Blocks {
    offsets: Vec<u64>,
    records: Vec<(Context, Chunk)>,
}

impl Blocks {
    /// Call after the header is written.
    fn start(block: &mut bgzf::Writer<Vec<u8>>) -> Self {
        block.flush().unwrap();
        Self {
            offsets: vec![0, block.virtual_position().compressed()],
            records: Vec::new(),
        }
    }

    /// Write one group of records, ending its block after the last one.
    fn group<T, F>(&mut self, writer: &mut T, block: BlockOf<T>, items: &[(Context, F)])
    where
        F: Fn(&mut T),
    {
        for (i, (context, write)) in items.iter().enumerate() {
            let start = block(&mut *writer).virtual_position();
            write(&mut *writer);
            if i + 1 == items.len() {
                block(&mut *writer).flush().unwrap();
            }
            let end = block(&mut *writer).virtual_position();
            self.records.push((*context, Chunk::new(start, end)));
        }
        self.offsets
            .push(block(&mut *writer).virtual_position().compressed());
    }

    fn finish(self, block: &mut bgzf::Writer<Vec<u8>>) -> Fixture {
        block.try_finish().unwrap();
        Fixture {
            bytes: block.get_ref().clone(),
            offsets: self.offsets,
            records: self.records,
        }
    }
}

pub fn sam_header() -> sam::Header {
    use sam::header::record::value::{Map, map::ReferenceSequence};

    let length = NonZeroUsize::try_from(1_000_000).unwrap();
    let mut builder = sam::Header::builder();
    for name in REFERENCES {
        builder = builder.add_reference_sequence(name, Map::<ReferenceSequence>::new(length));
    }
    builder.build()
}

fn read(name: String, placement: Option<(usize, usize)>) -> RecordBuf {
    let builder = RecordBuf::builder()
        .set_name(name)
        .set_sequence(vec![b'A'; READ_LEN].into())
        .set_quality_scores(vec![30; READ_LEN].into());

    match placement {
        Some((id, start)) => builder
            .set_flags(Flags::empty())
            .set_reference_sequence_id(id)
            .set_alignment_start(position(start))
            .set_cigar([Op::new(Kind::Match, READ_LEN)].into_iter().collect())
            .build(),
        None => builder.set_flags(Flags::UNMAPPED).build(),
    }
}

/// `(reference id, first start)` for each placed group.
const PLACED_GROUPS: [(usize, usize); 3] = [(0, 1), (0, 20_001), (1, 1)];

/// BAM with references chr1 and chr2.
///
/// Blocks: 0 header, 1 and 2 chr1 (16 kbp windows 0 and 1), 3 chr2,
/// 4 three unplaced reads.
pub fn bam_fixture() -> Fixture {
    let header = sam_header();
    let mut writer = bam::io::Writer::new(Vec::new());
    writer.write_header(&header).unwrap();

    let block: BlockOf<BamWriter> = BamWriter::get_mut;
    let mut blocks = Blocks::start(block(&mut writer));

    let mut groups: Vec<Vec<(Context, RecordBuf)>> = PLACED_GROUPS
        .iter()
        .enumerate()
        .map(|(g, &(id, first))| {
            (0..GROUP_LEN)
                .map(|i| {
                    let start = first + 10 * i;
                    let context = Some((id, position(start), position(start + READ_LEN - 1), true));
                    (context, read(format!("r{g}.{i}"), Some((id, start))))
                })
                .collect()
        })
        .collect();
    groups.push((0..3).map(|i| (None, read(format!("u{i}"), None))).collect());

    for group in &groups {
        let items: Vec<_> = group
            .iter()
            .map(|(context, record)| {
                let header = &header;
                (*context, move |w: &mut BamWriter| {
                    w.write_alignment_record(header, record).unwrap()
                })
            })
            .collect();
        blocks.group(&mut writer, block, &items);
    }

    blocks.finish(block(&mut writer))
}

pub fn vcf_header() -> vcf::Header {
    use vcf::header::record::value::{Map, map::Contig};

    let mut builder = vcf::Header::builder();
    for name in REFERENCES {
        builder = builder.add_contig(name, Map::<Contig>::new());
    }
    builder.build()
}

fn variant(id: usize, start: usize) -> vcf::variant::RecordBuf {
    vcf::variant::RecordBuf::builder()
        .set_reference_sequence_name(REFERENCES[id])
        .set_variant_start(position(start))
        .set_reference_bases("A")
        .set_alternate_bases(vec![String::from("C")].into())
        .build()
}

/// Writes [`PLACED_GROUPS`] as one-base variants through any variant writer.
fn variant_fixture<W>(mut writer: W, block: BlockOf<W>) -> Fixture
where
    W: vcf::variant::io::Write,
{
    let header = vcf_header();
    writer.write_variant_header(&header).unwrap();
    let mut blocks = Blocks::start(block(&mut writer));

    let header = &header;
    for &(id, first) in &PLACED_GROUPS {
        let items: Vec<_> = (0..GROUP_LEN)
            .map(|i| {
                let start = first + 10 * i;
                let record = variant(id, start);
                let context = Some((id, position(start), position(start), true));
                (context, move |w: &mut W| {
                    w.write_variant_record(header, &record).unwrap()
                })
            })
            .collect();
        blocks.group(&mut writer, block, &items);
    }

    blocks.finish(block(&mut writer))
}

/// bgzipped VCF with contigs chr1 and chr2, blocks laid out like the BAM
/// minus the unplaced block.
pub fn vcf_fixture() -> Fixture {
    let writer = vcf::io::Writer::new(bgzf::Writer::new(Vec::new()));
    variant_fixture(writer, vcf::io::Writer::get_mut)
}

/// BCF carrying the same variants as [`vcf_fixture`].
pub fn bcf_fixture() -> Fixture {
    let writer = bcf::io::Writer::new(Vec::new());
    variant_fixture(writer, bcf::io::Writer::get_mut)
}

/// Every record in a served BAM stream. Fails on broken BGZF framing or a
/// record cut short.
pub fn decode_bam(bytes: &[u8]) -> Vec<RecordBuf> {
    let mut reader = bam::io::Reader::new(bytes);
    let header = reader.read_header().unwrap();
    reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .unwrap()
}

pub fn decode_vcf(bytes: &[u8]) -> Vec<vcf::variant::RecordBuf> {
    let mut reader = vcf::io::Reader::new(bgzf::Reader::new(bytes));
    let header = reader.read_header().unwrap();
    reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .unwrap()
}

pub fn decode_bcf(bytes: &[u8]) -> Vec<vcf::variant::RecordBuf> {
    let mut reader = bcf::io::Reader::new(bytes);
    let header = reader.read_header().unwrap();
    reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .unwrap()
}

/// Reference names of decoded variants, in order.
pub fn contigs(records: &[vcf::variant::RecordBuf]) -> Vec<&str> {
    records.iter().map(|r| r.reference_sequence_name()).collect()
}

pub fn vp(compressed: u64) -> VirtualPosition {
    VirtualPosition::try_from((compressed, 0)).unwrap()
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).unwrap();
}

/// Storage that counts every call before delegating.
pub struct CountingStorage {
    inner: LocalStorage,
    pub calls: AtomicUsize,
}

impl CountingStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: LocalStorage::new(dir.to_path_buf()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn locate(&self, id: &str, format: Format) -> htsget_slice::Result<DataFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.locate(id, format).await
    }

    async fn read_index(&self, index: &IndexFile) -> htsget_slice::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_index(index).await
    }

    async fn open_data(&self, file: &DataFile) -> htsget_slice::Result<DataSource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.open_data(file).await
    }

    async fn read_range(&self, file: &DataFile, range: ByteRange) -> htsget_slice::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_range(file, range).await
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<CountingStorage>,
    pub indexes: Arc<IndexProvider>,
}

pub fn app(dir: &Path) -> TestApp {
    build_app(dir, Arc::new(AllowAll), None, PlanOptions::default())
}

pub fn app_with(dir: &Path, authorizer: Arc<dyn Authorizer>, signer: Option<UrlSigner>) -> TestApp {
    build_app(dir, authorizer, signer, PlanOptions::default())
}

pub fn app_with_planning(dir: &Path, planning: PlanOptions) -> TestApp {
    build_app(dir, Arc::new(AllowAll), None, planning)
}

fn build_app(
    dir: &Path,
    authorizer: Arc<dyn Authorizer>,
    signer: Option<UrlSigner>,
    planning: PlanOptions,
) -> TestApp {
    let storage = Arc::new(CountingStorage::new(dir));
    let cache = IndexCache::new(16, Duration::from_secs(30));
    let indexes = Arc::new(IndexProvider::new(storage.clone(), cache));

    let state = AppState {
        storage: storage.clone(),
        indexes: indexes.clone(),
        resolver: Arc::new(DataUrlResolver::new(BASE_URL, signer.clone())),
        planning,
    };
    let auth = Arc::new(AuthConfig::new(authorizer, signer));

    TestApp {
        server: TestServer::new(create_router(state, auth)).unwrap(),
        storage,
        indexes,
    }
}
