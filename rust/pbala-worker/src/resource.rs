//! Per-task resource-usage sampling, grounded on `task_fork.c`'s
//! `getrusage(RUSAGE_CHILDREN, ...)` + `prtusage()` call after `waitid`.
//!
//! The original samples cumulative `RUSAGE_CHILDREN` once per task, which
//! mixes in every previously reaped child on the same worker. Since a
//! slot only ever has one child live at a time, taking a before/after
//! snapshot and reporting the delta gives a true per-task figure instead
//! without changing anything observable about the supervision loop.

use nix::sys::resource::{getrusage, UsageWho};

/// What ends up in `<id>_mem.txt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub max_rss_kb: i64,
    pub user_time_s: f64,
    pub system_time_s: f64,
    pub minor_page_faults: i64,
    pub major_page_faults: i64,
}

impl ResourceUsage {
    fn sample() -> Self {
        match getrusage(UsageWho::RUSAGE_CHILDREN) {
            Ok(usage) => ResourceUsage {
                max_rss_kb: usage.max_rss(),
                user_time_s: usage.user_time().tv_sec() as f64 + usage.user_time().tv_usec() as f64 / 1_000_000.0,
                system_time_s: usage.system_time().tv_sec() as f64 + usage.system_time().tv_usec() as f64 / 1_000_000.0,
                minor_page_faults: usage.minor_page_faults(),
                major_page_faults: usage.major_page_faults(),
            },
            Err(_) => ResourceUsage {
                max_rss_kb: 0,
                user_time_s: 0.0,
                system_time_s: 0.0,
                minor_page_faults: 0,
                major_page_faults: 0,
            },
        }
    }

    fn delta(before: Self, after: Self) -> Self {
        ResourceUsage {
            max_rss_kb: after.max_rss_kb.max(before.max_rss_kb),
            user_time_s: (after.user_time_s - before.user_time_s).max(0.0),
            system_time_s: (after.system_time_s - before.system_time_s).max(0.0),
            minor_page_faults: (after.minor_page_faults - before.minor_page_faults).max(0),
            major_page_faults: (after.major_page_faults - before.major_page_faults).max(0),
        }
    }

    pub fn to_mem_file_contents(self) -> String {
        format!(
            "max_rss_kb={}\nuser_time_s={:.6}\nsystem_time_s={:.6}\nminor_page_faults={}\nmajor_page_faults={}\n",
            self.max_rss_kb, self.user_time_s, self.system_time_s, self.minor_page_faults, self.major_page_faults
        )
    }
}

/// Sample `RUSAGE_CHILDREN` before a child spawns; call `finish` after
/// `wait` returns to get the per-task delta.
pub struct ResourceSampler {
    before: ResourceUsage,
}

impl ResourceSampler {
    pub fn start() -> Self {
        ResourceSampler {
            before: ResourceUsage::sample(),
        }
    }

    pub fn finish(self) -> ResourceUsage {
        ResourceUsage::delta(self.before, ResourceUsage::sample())
    }
}
