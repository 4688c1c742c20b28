//! In-memory collaborators for host tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use spin::Mutex;

use crate::console::Console;
use crate::fs::FileSystem;
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};
use crate::process::{Machine, Pid, Process, Scheduler};
use crate::syscall::{limits, Dispatcher, Disposition, UserLayout};

/// First page of scratch data used by `Harness`.
pub const DATA_PAGE: usize = 0x1000_0000;
/// Page holding the call record used by `Harness`.
pub const STACK_PAGE: usize = 0x7FFF_0000;

/// Paged user memory with per-page flags.
pub struct SparseMemory {
    pages: BTreeMap<usize, (PageFlags, Box<[u8; PAGE_SIZE]>)>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Map the page containing `addr`, or change its flags if mapped.
    pub fn map(&mut self, addr: usize, flags: PageFlags) {
        let page = VirtAddr::new(addr).page_number();
        self.pages
            .entry(page)
            .and_modify(|entry| entry.0 = flags)
            .or_insert_with(|| (flags, Box::new([0; PAGE_SIZE])));
    }

    fn byte_mut(&mut self, addr: usize) -> &mut u8 {
        let addr = VirtAddr::new(addr);
        let (_, page) = self
            .pages
            .get_mut(&addr.page_number())
            .unwrap_or_else(|| panic!("write to unmapped test page {}", addr));
        &mut page[addr.page_offset()]
    }

    fn byte(&self, addr: usize) -> u8 {
        let addr = VirtAddr::new(addr);
        let (_, page) = self
            .pages
            .get(&addr.page_number())
            .unwrap_or_else(|| panic!("read from unmapped test page {}", addr));
        page[addr.page_offset()]
    }

    /// Store bytes regardless of page flags.
    pub fn poke(&mut self, addr: usize, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            *self.byte_mut(addr + i) = b;
        }
    }

    pub fn poke_words(&mut self, addr: usize, words: &[usize]) {
        for (i, word) in words.iter().enumerate() {
            self.poke(addr + i * limits::WORD_SIZE, &word.to_ne_bytes());
        }
    }

    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        (0..len).map(|i| self.byte(addr + i)).collect()
    }
}

impl AddressSpace for SparseMemory {
    fn page_flags(&self, addr: VirtAddr) -> PageFlags {
        self.pages
            .get(&addr.page_number())
            .map(|(flags, _)| *flags)
            .unwrap_or(PageFlags::empty())
    }

    fn copy_in(&self, src: VirtAddr, dst: &mut [u8]) {
        let bytes = self.peek(src.as_usize(), dst.len());
        dst.copy_from_slice(&bytes);
    }

    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]) {
        self.poke(dst.as_usize(), src);
    }
}

/// Open file in `RamFs`.
#[derive(Debug)]
pub struct RamFile {
    name: String,
    pos: usize,
}

/// Flat in-memory file system. Files grow on write.
pub struct RamFs {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl RamFs {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, name: &str, contents: &[u8]) {
        self.files.lock().insert(name.into(), contents.to_vec());
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).cloned()
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

impl FileSystem for RamFs {
    type Handle = RamFile;

    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock();
        if name.is_empty() || files.contains_key(name) {
            return false;
        }
        files.insert(name.into(), vec![0; initial_size as usize]);
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name).is_some()
    }

    fn open(&self, name: &str) -> Option<RamFile> {
        if !self.files.lock().contains_key(name) {
            return None;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(RamFile {
            name: name.into(),
            pos: 0,
        })
    }

    fn length(&self, file: &RamFile) -> u32 {
        self.files.lock().get(&file.name).map_or(0, |data| data.len() as u32)
    }

    fn read(&self, file: &mut RamFile, buf: &mut [u8]) -> usize {
        let files = self.files.lock();
        let Some(data) = files.get(&file.name) else {
            return 0;
        };
        let available = data.len().saturating_sub(file.pos);
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&data[file.pos..file.pos + count]);
        file.pos += count;
        count
    }

    fn write(&self, file: &mut RamFile, buf: &[u8]) -> usize {
        let mut files = self.files.lock();
        let Some(data) = files.get_mut(&file.name) else {
            return 0;
        };
        let end = file.pos + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[file.pos..end].copy_from_slice(buf);
        file.pos = end;
        buf.len()
    }

    fn seek(&self, file: &mut RamFile, position: u32) {
        file.pos = position as usize;
    }

    fn tell(&self, file: &RamFile) -> u32 {
        file.pos as u32
    }

    fn close(&self, _file: RamFile) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Console that records output and replays scripted keystrokes.
pub struct RecordingConsole {
    output: Mutex<Vec<u8>>,
    input: Mutex<VecDeque<u8>>,
    writes: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            output: Mutex::new(Vec::new()),
            input: Mutex::new(input.iter().copied().collect()),
            writes: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn pending_input(&self) -> usize {
        self.input.lock().len()
    }

    /// Highest number of `write_bytes` calls ever in flight at once.
    pub fn max_concurrent_writers(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Console for RecordingConsole {
    fn write_bytes(&self, bytes: &[u8]) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        // Leave a window for an unserialized second writer to show up
        for _ in 0..8 {
            std::thread::yield_now();
        }
        self.output.lock().extend_from_slice(bytes);
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn read_byte(&self) -> u8 {
        self.input
            .lock()
            .pop_front()
            .expect("console input exhausted")
    }
}

/// Scheduler that spawns named processes and runs queued work on yield.
pub struct MockScheduler<H> {
    processes: Mutex<BTreeMap<Pid, Arc<Process<H>>>>,
    next_pid: AtomicI32,
    on_yield: Mutex<VecDeque<Box<dyn FnOnce()>>>,
    yields: AtomicUsize,
}

impl<H> MockScheduler<H> {
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(BTreeMap::new()),
            next_pid: AtomicI32::new(1),
            on_yield: Mutex::new(VecDeque::new()),
            yields: AtomicUsize::new(0),
        }
    }

    /// Create a process record as the scheduler would on spawn.
    pub fn register(&self, name: &str) -> Arc<Process<H>> {
        let pid = Pid::new(self.next_pid.fetch_add(1, Ordering::SeqCst));
        let process = Process::new(pid, name);
        self.processes.lock().insert(pid, Arc::clone(&process));
        process
    }

    /// Run `work` the next time someone yields.
    pub fn on_yield(&self, work: impl FnOnce() + 'static) {
        self.on_yield.lock().push_back(Box::new(work));
    }

    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }
}

impl<H> Scheduler<H> for MockScheduler<H> {
    /// Command lines whose program is `missing` fail to load.
    fn spawn(&self, cmdline: &str) -> Option<Pid> {
        let program = cmdline.split_whitespace().next()?;
        if program == "missing" {
            return None;
        }
        Some(self.register(program).pid())
    }

    fn lookup(&self, pid: Pid) -> Option<Arc<Process<H>>> {
        self.processes.lock().get(&pid).cloned()
    }

    fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        let work = self.on_yield.lock().pop_front();
        match work {
            Some(work) => work(),
            None => panic!("yield with nothing else runnable"),
        }
    }

    fn terminate_current(&self, status: i32) -> ! {
        panic!("terminated with status {}", status)
    }
}

/// Machine whose power switch panics.
pub struct PowerSwitch;

impl Machine for PowerSwitch {
    fn power_off(&self) -> ! {
        panic!("powered off")
    }
}

pub type TestDispatcher = Dispatcher<RamFs, MockScheduler<RamFile>, RecordingConsole>;

/// A dispatcher, one address space and a process named `main`.
pub struct Harness {
    pub dispatcher: TestDispatcher,
    pub memory: SparseMemory,
    pub process: Arc<Process<RamFile>>,
    next_data: usize,
}

impl Harness {
    /// Number of scratch pages mapped from `DATA_PAGE`.
    pub const DATA_PAGES: usize = 4;

    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        let scheduler = MockScheduler::new();
        let process = scheduler.register("main");
        let dispatcher = Dispatcher::new(
            RamFs::new(),
            scheduler,
            RecordingConsole::with_input(input),
            UserLayout::default(),
        );

        let mut memory = SparseMemory::new();
        memory.map(STACK_PAGE, PageFlags::USER_WRITE);
        for i in 0..Self::DATA_PAGES {
            memory.map(DATA_PAGE + i * PAGE_SIZE, PageFlags::USER_WRITE);
        }

        Self {
            dispatcher,
            memory,
            process,
            next_data: DATA_PAGE,
        }
    }

    /// Place bytes in scratch memory and return their address.
    pub fn bytes(&mut self, bytes: &[u8]) -> usize {
        let addr = self.next_data;
        self.memory.poke(addr, bytes);
        self.next_data += bytes.len();
        addr
    }

    /// Place a NUL-terminated string in scratch memory.
    pub fn string(&mut self, s: &str) -> usize {
        let addr = self.bytes(s.as_bytes());
        self.bytes(&[0]);
        addr
    }

    pub fn create_file(&self, name: &str, contents: &[u8]) {
        self.dispatcher.file_system().insert(name, contents);
    }

    /// Write a call record and return the stack pointer addressing it.
    pub fn push_call(&mut self, words: &[usize]) -> usize {
        let sp = STACK_PAGE + 0x800;
        self.memory.poke_words(sp, words);
        sp
    }

    pub fn call(&mut self, words: &[usize]) -> Disposition {
        let current = Arc::clone(&self.process);
        self.call_as(&current, words)
    }

    pub fn call_as(&mut self, process: &Arc<Process<RamFile>>, words: &[usize]) -> Disposition {
        let sp = self.push_call(words);
        self.dispatcher
            .dispatch(process, &mut self.memory, VirtAddr::new(sp))
    }

    pub fn lookup(&self, pid: usize) -> Arc<Process<RamFile>> {
        self.dispatcher
            .scheduler()
            .lookup(Pid::new(pid as i32))
            .expect("no such process")
    }

    pub fn console_output(&self) -> String {
        String::from_utf8(self.dispatcher.console().inner().output()).expect("console output is not UTF-8")
    }
}
