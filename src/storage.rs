use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::time::Instant;

use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::{SpiAnyPins, SpiDriver, SpiDriverConfig};
use esp_idf_hal::sys::EspError;
use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_svc::io::vfs::MountedFatfs;
use esp_idf_svc::sd::{spi::SdSpiHostDriver, SdCardConfiguration, SdCardDriver};

pub const MOUNT_POINT: &str = "/sdcard";
pub const LOG_PATH: &str = "/sdcard/access_log.txt";

pub type SdMount = MountedFatfs<Fatfs<SdCardDriver<SdSpiHostDriver<'static, SpiDriver<'static>>>>>;

/// 挂载 SPI 接口的 SD 卡并注册 FAT 文件系统到 VFS。
///
/// 挂载成功后日志经 std::fs 写入挂载点；返回值须在整个运行期持有。
pub fn mount_sd<SPI: SpiAnyPins>(
    spi: impl Peripheral<P = SPI> + 'static,
    sclk: impl Peripheral<P = impl OutputPin> + 'static,
    mosi: impl Peripheral<P = impl OutputPin> + 'static,
    miso: impl Peripheral<P = impl InputPin> + 'static,
    cs: impl Peripheral<P = impl OutputPin> + 'static,
) -> Result<SdMount, EspError> {
    let spi_driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &SpiDriverConfig::default())?;
    let host = SdSpiHostDriver::new(
        spi_driver,
        Some(cs),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        #[cfg(not(any(
            esp_idf_version_major = "4",
            all(esp_idf_version_major = "5", esp_idf_version_minor = "0"),
            all(esp_idf_version_major = "5", esp_idf_version_minor = "1")
        )))]
        None,
    )?;
    let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
    let mount = MountedFatfs::mount(Fatfs::new_sdcard(0, card)?, MOUNT_POINT, 4)?;
    Ok(mount)
}

/// 追加式事件日志。
///
/// 每条记录独立走 open-append-write-sync-close，不做批量事务；
/// 时间戳优先用外设行里带的外部时间，缺失时回落为开机时长 MM:SS。
#[derive(Clone)]
pub struct EventLog {
    path: PathBuf,
    boot: Instant,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, boot: Instant) -> Self {
        Self {
            path: path.into(),
            boot,
        }
    }

    /// 追加一行 `[<timestamp>] <EVENT_TYPE>: <message>`。
    pub fn append(
        &self,
        event_type: &str,
        message: &str,
        external_ts: Option<&str>,
    ) -> io::Result<()> {
        let timestamp = match external_ts {
            Some(ts) => ts.to_string(),
            None => self.fallback_timestamp(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("[{}] {}: {}\n", timestamp, event_type, message).as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn fallback_timestamp(&self) -> String {
        let secs = self.boot.elapsed().as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_log() -> (EventLog, PathBuf) {
        let path = std::env::temp_dir().join(format!("access_log_test_{}.txt", std::process::id()));
        let _ = fs::remove_file(&path);
        (EventLog::new(&path, Instant::now()), path)
    }

    #[test]
    fn appends_with_external_timestamp() {
        let (log, path) = temp_log();
        log.append("ACCESS_EVENT", "UID=224c8d04, Status=AUTHORIZED", Some("2025-03-14 09:26:53"))
            .unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "[2025-03-14 09:26:53] ACCESS_EVENT: UID=224c8d04, Status=AUTHORIZED\n"
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn fallback_timestamp_is_boot_relative() {
        let (log, path) = temp_log();
        log.append("PIR_EVENT", "MOTION_DETECTED", None).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        // 刚开机，回落时间戳形如 [00:00]
        assert!(contents.starts_with("[00:0"), "unexpected line: {}", contents);
        assert!(contents.ends_with("PIR_EVENT: MOTION_DETECTED\n"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn records_accumulate_in_order() {
        let (log, path) = temp_log();
        log.append("ACCESS_EVENT", "UID=a, Status=AUTHORIZED", Some("t1")).unwrap();
        log.append("ACCESS_EVENT", "UID=b, Status=UNAUTHORIZED", Some("t2")).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("UID=a"));
        assert!(lines[1].contains("UNAUTHORIZED"));
        let _ = fs::remove_file(&path);
    }
}
