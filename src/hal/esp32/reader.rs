//! Wiegand data-line interrupts on ESP32.
//!
//! # Wiring
//!
//! - D0 → GPIO4 (default), D1 → GPIO5 (default)
//! - Reader outputs are open-collector 5V; use a level shifter or a divider
//!
//! Both lines idle high and pulse low once per bit, so each line gets a
//! falling-edge interrupt that feeds the shared [`EdgeCapture`].

use core::ffi::c_void;

use esp_idf_sys::{
    esp, gpio_config, gpio_config_t, gpio_install_isr_service, gpio_int_type_t_GPIO_INTR_NEGEDGE,
    gpio_isr_handler_add, gpio_isr_handler_remove, gpio_mode_t_GPIO_MODE_INPUT,
    gpio_pulldown_t_GPIO_PULLDOWN_DISABLE, gpio_pullup_t_GPIO_PULLUP_ENABLE, EspError,
    ESP_ERR_INVALID_STATE,
};

use crate::wiegand::{DataLine, EdgeCapture};

/// Attached D0/D1 interrupts. Dropping it detaches them.
///
/// # Example
///
/// ```ignore
/// use rs_doorman::hal::esp32::Esp32WiegandLines;
/// use rs_doorman::wiegand::{EdgeCapture, WiegandReader};
///
/// static CAPTURE: EdgeCapture = EdgeCapture::new();
///
/// let _lines = Esp32WiegandLines::attach(&CAPTURE, 4, 5)?;
/// let mut reader = WiegandReader::new(&CAPTURE, config.reader.clone());
/// ```
pub struct Esp32WiegandLines {
    d0: i32,
    d1: i32,
}

impl Esp32WiegandLines {
    /// Configure `d0`/`d1` as pulled-up inputs and route their falling
    /// edges into `capture`.
    pub fn attach(capture: &'static EdgeCapture, d0: u8, d1: u8) -> Result<Self, EspError> {
        let d0 = i32::from(d0);
        let d1 = i32::from(d1);

        let io = gpio_config_t {
            pin_bit_mask: (1u64 << d0) | (1u64 << d1),
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
            ..Default::default()
        };

        let arg = capture as *const EdgeCapture as *mut c_void;
        unsafe {
            esp!(gpio_config(&io))?;

            // Another driver may already have installed the shared service
            let err = gpio_install_isr_service(0);
            if err != ESP_ERR_INVALID_STATE {
                esp!(err)?;
            }

            esp!(gpio_isr_handler_add(d0, Some(on_d0), arg))?;
            esp!(gpio_isr_handler_add(d1, Some(on_d1), arg))?;
        }

        log::info!("wiegand: reader attached on D0=GPIO{} D1=GPIO{}", d0, d1);
        Ok(Self { d0, d1 })
    }
}

impl Drop for Esp32WiegandLines {
    fn drop(&mut self) {
        unsafe {
            gpio_isr_handler_remove(self.d0);
            gpio_isr_handler_remove(self.d1);
        }
    }
}

fn on_edge(arg: *mut c_void, line: DataLine) {
    // `arg` is the `&'static EdgeCapture` passed to `attach`
    let capture = unsafe { &*(arg as *const EdgeCapture) };
    let now = unsafe { esp_idf_sys::esp_timer_get_time() };
    capture.on_edge(line, now as u32, (now / 1000) as u64);
}

unsafe extern "C" fn on_d0(arg: *mut c_void) {
    on_edge(arg, DataLine::Zero);
}

unsafe extern "C" fn on_d1(arg: *mut c_void) {
    on_edge(arg, DataLine::One);
}
