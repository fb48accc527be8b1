// Resource vector models: instantaneous quantities and integrated totals

use serde::{Deserialize, Serialize};

/// Resources held (or requested) by one deployment at one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVector {
    #[serde(default)]
    pub cpu_num: u64,
    #[serde(default, rename = "cpu_MHz")]
    pub cpu_mhz: u64,
    #[serde(default, rename = "memory_MB", alias = "memoryMB")]
    pub memory_mb: u64,
    #[serde(default, rename = "disk_MB", alias = "diskMB")]
    pub disk_mb: u64,
    #[serde(default)]
    pub gpu_num: u64,
}

impl ResourceVector {
    /// Older jobs were submitted with the CPU clock share in place of the core count.
    /// Returns true when the compensation was applied.
    pub fn backfill_cpu_num(&mut self) -> bool {
        if self.cpu_num == 0 && self.cpu_mhz > 0 {
            self.cpu_num = self.cpu_mhz;
            true
        } else {
            false
        }
    }

    pub fn saturating_add(&self, other: &ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_num: self.cpu_num.saturating_add(other.cpu_num),
            cpu_mhz: self.cpu_mhz.saturating_add(other.cpu_mhz),
            memory_mb: self.memory_mb.saturating_add(other.memory_mb),
            disk_mb: self.disk_mb.saturating_add(other.disk_mb),
            gpu_num: self.gpu_num.saturating_add(other.gpu_num),
        }
    }
}

/// Fractional resource quantities: resource-seconds while integrating, resource-days or
/// daily means in reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub cpu_num: f64,
    #[serde(rename = "cpu_MHz")]
    pub cpu_mhz: f64,
    #[serde(rename = "memory_MB")]
    pub memory_mb: f64,
    #[serde(rename = "disk_MB")]
    pub disk_mb: f64,
    pub gpu_num: f64,
}

impl ResourceTotals {
    /// Adds `v * factor` component-wise (factor is a duration in seconds, or 1.0 for plain sums).
    pub fn add_scaled(&mut self, v: &ResourceVector, factor: f64) {
        self.cpu_num += v.cpu_num as f64 * factor;
        self.cpu_mhz += v.cpu_mhz as f64 * factor;
        self.memory_mb += v.memory_mb as f64 * factor;
        self.disk_mb += v.disk_mb as f64 * factor;
        self.gpu_num += v.gpu_num as f64 * factor;
    }

    pub fn add(&mut self, other: &ResourceTotals) {
        self.cpu_num += other.cpu_num;
        self.cpu_mhz += other.cpu_mhz;
        self.memory_mb += other.memory_mb;
        self.disk_mb += other.disk_mb;
        self.gpu_num += other.gpu_num;
    }

    /// Component-wise division, e.g. resource-seconds to resource-hours.
    pub fn divided(&self, divisor: f64) -> ResourceTotals {
        ResourceTotals {
            cpu_num: self.cpu_num / divisor,
            cpu_mhz: self.cpu_mhz / divisor,
            memory_mb: self.memory_mb / divisor,
            disk_mb: self.disk_mb / divisor,
            gpu_num: self.gpu_num / divisor,
        }
    }

    /// Drops the fractional part (resource-hours in the namespace report).
    pub fn truncated(&self) -> ResourceVector {
        ResourceVector {
            cpu_num: self.cpu_num.max(0.0).trunc() as u64,
            cpu_mhz: self.cpu_mhz.max(0.0).trunc() as u64,
            memory_mb: self.memory_mb.max(0.0).trunc() as u64,
            disk_mb: self.disk_mb.max(0.0).trunc() as u64,
            gpu_num: self.gpu_num.max(0.0).trunc() as u64,
        }
    }

    pub fn rounded(&self) -> ResourceVector {
        ResourceVector {
            cpu_num: self.cpu_num.max(0.0).round() as u64,
            cpu_mhz: self.cpu_mhz.max(0.0).round() as u64,
            memory_mb: self.memory_mb.max(0.0).round() as u64,
            disk_mb: self.disk_mb.max(0.0).round() as u64,
            gpu_num: self.gpu_num.max(0.0).round() as u64,
        }
    }
}

/// One column of the resource vector, for table rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    CpuNum,
    CpuMhz,
    MemoryMb,
    DiskMb,
    GpuNum,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::CpuNum,
        Resource::CpuMhz,
        Resource::MemoryMb,
        Resource::DiskMb,
        Resource::GpuNum,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Resource::CpuNum => "cpu_num",
            Resource::CpuMhz => "cpu_MHz",
            Resource::MemoryMb => "memory_MB",
            Resource::DiskMb => "disk_MB",
            Resource::GpuNum => "gpu_num",
        }
    }

    pub fn of(&self, v: &ResourceVector) -> u64 {
        match self {
            Resource::CpuNum => v.cpu_num,
            Resource::CpuMhz => v.cpu_mhz,
            Resource::MemoryMb => v.memory_mb,
            Resource::DiskMb => v.disk_mb,
            Resource::GpuNum => v.gpu_num,
        }
    }

    pub fn of_totals(&self, t: &ResourceTotals) -> f64 {
        match self {
            Resource::CpuNum => t.cpu_num,
            Resource::CpuMhz => t.cpu_mhz,
            Resource::MemoryMb => t.memory_mb,
            Resource::DiskMb => t.disk_mb,
            Resource::GpuNum => t.gpu_num,
        }
    }
}
