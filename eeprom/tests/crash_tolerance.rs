// Crash-tolerance testing: walks a seeded sequence of rewrites of one id
// across every device profile, cutting power at a randomly chosen flash
// call each round and remounting at full power to check what survived.

use eeprom::{Eeprom, ReadError, WriteError};
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use simflash::styles::{DeviceProfile, ALL_STYLES};
use simflash::{FaultError, FaultInjector};

const DATA_NUM: usize = 1;
const ROUNDS: usize = 40;
const MAX_BUDGET: u32 = 12;

fn mount<F: storage::Flash>(flash: F, sector_size: usize) -> Eeprom<F, DATA_NUM> {
    Eeprom::init(
        flash,
        0,
        2 * sector_size,
        2,
        1,
        4 * sector_size,
        5 * sector_size,
        1,
    )
    .unwrap()
}

fn random_payload(rng: &mut Xoshiro256Plus) -> [u8; 4] {
    let mut buf = [0u8; 4];
    rng.fill_bytes(&mut buf);
    buf
}

/// Repeatedly rewrites id 0 under an interrupted fault budget, remounting
/// with full power after every attempt, and checks that the value read back
/// is always either the value from before that attempt or the value it was
/// trying to write — never a third, garbage value, and never a lost write
/// that the call actually reported success on.
fn run_profile(profile: &DeviceProfile) -> anyhow::Result<()> {
    let mut rng = Xoshiro256Plus::seed_from_u64(profile.sector_size as u64 ^ profile.sectors as u64);

    let mut flash = profile.build();
    let mut committed: Option<[u8; 4]> = None;

    for _ in 0..ROUNDS {
        let budget = (rng.next_u32() % MAX_BUDGET) as usize;
        let candidate = random_payload(&mut rng);

        let injected = FaultInjector::with_budget(flash, budget);
        let mut ee = mount(injected, profile.sector_size);

        match ee.write(0, &candidate) {
            Ok(()) => committed = Some(candidate),
            Err(WriteError::Flash(FaultError::PowerLoss)) => {}
            Err(e) => anyhow::bail!("unexpected write error on {:?}: {e:?}", profile),
        }

        let raw = ee.into_inner().into_inner();
        let mut ee = mount(raw, profile.sector_size);

        let mut out = [0u8; 4];
        match ee.read(0, &mut out) {
            Ok(()) => {
                if Some(out) != committed && out != candidate {
                    anyhow::bail!(
                        "on {:?}: read {out:?} matched neither last committed {committed:?} nor candidate {candidate:?}",
                        profile
                    );
                }
                committed = Some(out);
            }
            Err(ReadError::NotWritten) => {
                if committed.is_some() {
                    anyhow::bail!("on {:?}: lost a previously committed value after crash", profile);
                }
            }
            Err(e) => anyhow::bail!("unexpected read error on {:?}: {e:?}", profile),
        }

        flash = ee.into_inner();
    }

    Ok(())
}

/// Plain, no-fault sanity pass over every built device, the way a single
/// golden scenario is checked against each profile shape before layering
/// fault injection on top.
#[test]
fn roundtrip_holds_across_all_device_profiles() {
    use storage::{Flash, ReadFlash};

    for flash in simflash::styles::all_flashes() {
        let sector_size = flash.sector_size();
        if flash.capacity() < 6 * sector_size {
            continue;
        }
        let mut ee = mount(flash, sector_size);
        ee.write(0, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let mut out = [0u8; 4];
        ee.read(0, &mut out).unwrap();
        assert_eq!(out, [0xDE, 0xAD, 0xBE, 0xEF]);
    }
}

#[test]
fn crash_during_write_preserves_last_committed_value() {
    for profile in ALL_STYLES.iter().copied() {
        // Two region pairs (index + index-swap, data + data-swap) need at
        // least six sectors; STM32F_STYLE's four don't leave room for both
        // sides of the swap at once, so it sits this test out.
        if profile.sectors < 6 {
            continue;
        }
        run_profile(profile).unwrap();
    }
}
