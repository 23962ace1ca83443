use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::sys::EspError;

/// 授权提示音时长 / 拒绝提示音时长（毫秒）。
const TONE_GRANT_MS: u32 = 250;
const TONE_DENY_MS: u32 = 500;
/// 判定结果的 LED 保持时长。
const HOLD_MS: u32 = 2000;

/// 三色离散 LED + 蜂鸣器（逐通道开关，无 PWM）。
pub struct Indicator<'d> {
    red: PinDriver<'d, AnyOutputPin, Output>,
    green: PinDriver<'d, AnyOutputPin, Output>,
    blue: PinDriver<'d, AnyOutputPin, Output>,
    buzzer: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> Indicator<'d> {
    pub fn new(
        red: impl Peripheral<P = AnyOutputPin> + 'd,
        green: impl Peripheral<P = AnyOutputPin> + 'd,
        blue: impl Peripheral<P = AnyOutputPin> + 'd,
        buzzer: impl Peripheral<P = AnyOutputPin> + 'd,
    ) -> Result<Self, EspError> {
        let mut indicator = Self {
            red: PinDriver::output(red)?,
            green: PinDriver::output(green)?,
            blue: PinDriver::output(blue)?,
            buzzer: PinDriver::output(buzzer)?,
        };
        indicator.set_rgb(false, false, false)?;
        indicator.buzzer.set_low()?;
        Ok(indicator)
    }

    fn set_rgb(&mut self, r: bool, g: bool, b: bool) -> Result<(), EspError> {
        self.red.set_level(r.into())?;
        self.green.set_level(g.into())?;
        self.blue.set_level(b.into())?;
        Ok(())
    }

    /// 蜂鸣指定时长（同步阻塞，门禁反馈本就是人的节奏）。
    fn tone(&mut self, duration_ms: u32) -> Result<(), EspError> {
        self.buzzer.set_high()?;
        FreeRtos::delay_ms(duration_ms);
        self.buzzer.set_low()?;
        Ok(())
    }

    /// 刷卡判定反馈：绿灯=放行、红灯=拒绝，伴随提示音，保持后熄灭。
    pub fn signal_access(&mut self, granted: bool) -> Result<(), EspError> {
        if granted {
            self.set_rgb(false, true, false)?;
            self.tone(TONE_GRANT_MS)?;
        } else {
            self.set_rgb(true, false, false)?;
            self.tone(TONE_DENY_MS)?;
        }
        FreeRtos::delay_ms(HOLD_MS);
        self.set_rgb(false, false, false)
    }

    /// 人体感应反馈：蓝灯随移动状态亮灭。
    pub fn signal_motion(&mut self, detected: bool) -> Result<(), EspError> {
        self.set_rgb(false, false, detected)
    }

    /// 短促红闪，用于非致命的外设故障提示（如 SD 挂载失败）。
    pub fn flash_error(&mut self) -> Result<(), EspError> {
        for _ in 0..3 {
            self.set_rgb(true, false, false)?;
            FreeRtos::delay_ms(150);
            self.set_rgb(false, false, false)?;
            FreeRtos::delay_ms(150);
        }
        Ok(())
    }

    /// 致命初始化失败：停机并持续闪红，不再继续带病运行。
    pub fn halt_blinking(&mut self) -> ! {
        loop {
            let _ = self.set_rgb(true, false, false);
            FreeRtos::delay_ms(300);
            let _ = self.set_rgb(false, false, false);
            FreeRtos::delay_ms(300);
        }
    }
}
