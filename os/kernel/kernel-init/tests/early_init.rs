use kernel_acpi::Rsdp;
use kernel_alloc::{AllocError, MemoryRegion, PhysMapper};
use kernel_info::boot::{KernelImage, KernelParams, MULTIBOOT2_BOOTLOADER_MAGIC};
use kernel_init::{
    BootInfoSource, EarlyInitError, KERNEL_NAME, KERNEL_VERSION, Paging, kernel_early_init,
    kernel_early_init_with_params,
};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_multiboot::{BootInformation, MultibootError};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

const MIB: u64 = 1024 * 1024;
const RSDT: u32 = 0x07FE_14A0;

const IMAGE: KernelImage = KernelImage {
    kernel_end: PhysicalAddress::new(0x0020_0000),
    stack_top: VirtualAddress::new(0xC010_8000),
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Step {
    MapBitmap(u32),
    Paging,
}

type Steps = Rc<RefCell<Vec<Step>>>;

thread_local! {
    static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Collects log lines per test thread.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!("[{}] {}", record.level(), record.args());
        LINES.with(|lines| lines.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&CaptureLogger).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
    });
    LINES.with(|lines| lines.borrow_mut().clear());
}

fn logged() -> Vec<String> {
    LINES.with(|lines| lines.borrow().clone())
}

struct FakeBoot {
    regions: Option<Vec<MemoryRegion>>,
    rsdp: Option<Rsdp>,
    rsdt: Option<PhysicalAddress>,
}

impl FakeBoot {
    fn complete() -> Self {
        Self {
            regions: Some(vec![
                MemoryRegion::available(0, 0x9_F000),
                MemoryRegion::reserved(0xF_0000, 0x1_0000),
                MemoryRegion::available(MIB, 16 * MIB),
            ]),
            rsdp: Some(rsdp_v1(RSDT)),
            rsdt: Some(PhysicalAddress::new(RSDT)),
        }
    }
}

impl BootInfoSource for FakeBoot {
    fn memory_regions(&self) -> Option<impl Iterator<Item = MemoryRegion> + '_> {
        self.regions.as_ref().map(|r| r.iter().copied())
    }

    fn rsdp(&self) -> Option<Rsdp> {
        self.rsdp
    }

    fn rsdt_address(&self) -> Option<PhysicalAddress> {
        self.rsdt
    }
}

fn rsdp_v1(rsdt: u32) -> Rsdp {
    let mut raw = [0u8; 20];
    raw[..8].copy_from_slice(b"RSD PTR ");
    raw[9..15].copy_from_slice(b"BOCHS ");
    raw[16..20].copy_from_slice(&rsdt.to_le_bytes());
    raw[8] = kernel_acpi::checksum_fixup(&raw);
    Rsdp::parse(&raw).unwrap()
}

/// Serves the bitmap from a leaked host buffer.
struct LeakedMapper {
    steps: Steps,
}

impl PhysMapper for LeakedMapper {
    unsafe fn words_mut<'a>(&self, pa: PhysicalAddress, words: usize) -> &'a mut [u32] {
        self.steps.borrow_mut().push(Step::MapBitmap(pa.as_u32()));
        Box::leak(vec![0u32; words].into_boxed_slice())
    }
}

struct FakePaging {
    steps: Steps,
}

impl Paging for FakePaging {
    fn setup_paging(&mut self) {
        self.steps.borrow_mut().push(Step::Paging);
    }
}

fn fakes() -> (LeakedMapper, FakePaging, Steps) {
    let steps = Steps::default();
    (
        LeakedMapper {
            steps: steps.clone(),
        },
        FakePaging {
            steps: steps.clone(),
        },
        steps,
    )
}

#[test]
fn basic_variant_brings_up_memory_before_paging() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();

    let mut blocks =
        unsafe { kernel_early_init(|| Ok(FakeBoot::complete()), &IMAGE, &mapper, &mut paging) }
            .unwrap();

    assert_eq!(*steps.borrow(), vec![Step::MapBitmap(0x20_0000), Step::Paging]);
    assert_eq!(blocks.total_blocks(), 3839);
    assert_eq!(blocks.alloc(), Some(PhysicalAddress::new(0x20_1000)));

    let lines = logged();
    assert_eq!(lines[0], format!("[INFO] {KERNEL_NAME} kernel {KERNEL_VERSION}"));
    assert!(lines.iter().all(|l| !l.starts_with("[WARN]")));
}

#[test]
fn basic_variant_continues_without_acpi() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let boot = FakeBoot {
        rsdp: None,
        rsdt: None,
        ..FakeBoot::complete()
    };

    let blocks = unsafe { kernel_early_init(|| Ok(boot), &IMAGE, &mapper, &mut paging) };

    assert!(blocks.is_ok());
    assert!(steps.borrow().contains(&Step::Paging));
    assert!(
        logged()
            .iter()
            .any(|l| l.starts_with("[WARN] Could not find ACPI information"))
    );
}

#[test]
fn unrecognized_boot_information_is_fatal() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let bad = MultibootError::BadMagic { found: 0x2BAD_B002 };

    let result =
        unsafe { kernel_early_init(|| Err::<FakeBoot, _>(bad), &IMAGE, &mapper, &mut paging) };

    assert_eq!(result.err(), Some(EarlyInitError::Multiboot(bad)));
    assert!(steps.borrow().is_empty());
    // The banner comes first regardless.
    assert!(logged()[0].contains(KERNEL_NAME));
}

#[test]
fn missing_memory_map_is_fatal() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let boot = FakeBoot {
        regions: None,
        ..FakeBoot::complete()
    };

    let result = unsafe { kernel_early_init(|| Ok(boot), &IMAGE, &mapper, &mut paging) };

    assert_eq!(result.err(), Some(EarlyInitError::MissingMemoryMap));
    assert!(steps.borrow().is_empty());
}

#[test]
fn no_memory_above_the_kernel_skips_paging() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let boot = FakeBoot {
        regions: Some(vec![MemoryRegion::available(0, 0x9_F000)]),
        ..FakeBoot::complete()
    };

    let result = unsafe { kernel_early_init(|| Ok(boot), &IMAGE, &mapper, &mut paging) };

    assert_eq!(result.err(), Some(EarlyInitError::Alloc(AllocError::NoMemory)));
    assert!(!steps.borrow().contains(&Step::Paging));
}

#[test]
fn params_variant_fills_every_field() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let mut params = KernelParams {
        allocator_used_blocks: 0xFFFF,
        ..KernelParams::default()
    };

    let blocks = unsafe {
        kernel_early_init_with_params(
            || Ok(FakeBoot::complete()),
            &IMAGE,
            &mapper,
            &mut paging,
            &mut params,
        )
    }
    .unwrap();

    assert_eq!(*steps.borrow(), vec![Step::MapBitmap(0x20_0000), Step::Paging]);
    assert_eq!(
        params,
        KernelParams {
            kernel_stack: VirtualAddress::new(0xC010_8000),
            kernel_heap: VirtualAddress::new(0xC020_0000),
            kernel_memory_bitmap: VirtualAddress::new(0xC020_0000),
            allocator_total_blocks: 3839,
            allocator_used_blocks: 0,
            rsdt_address: PhysicalAddress::new(RSDT),
        }
    );
    assert_eq!(params.allocator_total_blocks, blocks.total_blocks());

    let lines = logged();
    assert!(lines.contains(&"[INFO] kparams struct:".to_string()));
    assert!(lines.contains(&"[INFO] kernel memory total blocks: 3839".to_string()));
    assert!(lines.contains(&"[INFO] kernel memory used blocks: 0".to_string()));
}

#[test]
fn params_variant_requires_the_rsdt() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let boot = FakeBoot {
        rsdt: None,
        ..FakeBoot::complete()
    };
    let mut params = KernelParams::default();

    let result = unsafe {
        kernel_early_init_with_params(|| Ok(boot), &IMAGE, &mapper, &mut paging, &mut params)
    };

    assert_eq!(result.err(), Some(EarlyInitError::RsdtMissing));
    assert!(steps.borrow().is_empty());
    assert_eq!(params, KernelParams::default());
}

#[test]
fn params_variant_requires_the_rsdp() {
    capture_logs();
    let (mapper, mut paging, steps) = fakes();
    let boot = FakeBoot {
        rsdp: None,
        ..FakeBoot::complete()
    };
    let mut params = KernelParams::default();

    let result = unsafe {
        kernel_early_init_with_params(|| Ok(boot), &IMAGE, &mapper, &mut paging, &mut params)
    };

    assert_eq!(result.err(), Some(EarlyInitError::RsdpMissing));
    assert!(steps.borrow().is_empty());
    assert!(
        logged()
            .iter()
            .any(|l| l == "[WARN] Could not find ACPI information")
    );
}

/// Multiboot2 information with loader name, command line and memory map
/// tags, but no ACPI tags.
fn multiboot_without_acpi() -> Vec<u64> {
    let mut bytes = Vec::new();
    let push32 = |bytes: &mut Vec<u8>, v: u32| bytes.extend_from_slice(&v.to_le_bytes());

    push32(&mut bytes, 88);
    push32(&mut bytes, 0);

    push32(&mut bytes, 2);
    push32(&mut bytes, 13);
    bytes.extend_from_slice(b"GRUB\0\0\0\0");

    push32(&mut bytes, 1);
    push32(&mut bytes, 14);
    bytes.extend_from_slice(b"quiet\0\0\0");

    push32(&mut bytes, 6);
    push32(&mut bytes, 40);
    push32(&mut bytes, 24);
    push32(&mut bytes, 0);
    bytes.extend_from_slice(&MIB.to_le_bytes());
    bytes.extend_from_slice(&(16 * MIB).to_le_bytes());
    push32(&mut bytes, 1);
    push32(&mut bytes, 0);

    push32(&mut bytes, 0);
    push32(&mut bytes, 8);

    bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn real_boot_information_drives_both_variants() {
    capture_logs();
    let words = multiboot_without_acpi();
    let bytes: &[u8] =
        unsafe { std::slice::from_raw_parts(words.as_ptr().cast(), words.len() * 8) };
    let parse = || BootInformation::parse(bytes, MULTIBOOT2_BOOTLOADER_MAGIC);

    let (mapper, mut paging, _) = fakes();
    let blocks = unsafe { kernel_early_init(parse, &IMAGE, &mapper, &mut paging) }.unwrap();
    assert_eq!(blocks.total_blocks(), 3839);

    let lines = logged();
    assert!(lines.contains(&"[INFO] Booted by GRUB".to_string()));
    assert!(lines.contains(&"[INFO] Command line: quiet".to_string()));

    let (mapper, mut paging, _) = fakes();
    let mut params = KernelParams::default();
    let result = unsafe {
        kernel_early_init_with_params(parse, &IMAGE, &mapper, &mut paging, &mut params)
    };
    assert_eq!(result.err(), Some(EarlyInitError::RsdtMissing));
}
