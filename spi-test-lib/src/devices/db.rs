use super::{Device, DeviceId};

// Ordered by catalog index.
pub static DEVICES: &[Device] = &[
    Device::new(DeviceId::Fram, "FRAM", 0, true),
    Device::new(DeviceId::ExternalSpi0, "EXTERNAL_SPI_0", 1, false),
    Device::new(DeviceId::ExternalSpi1, "EXTERNAL_SPI_1", 2, false),
    Device::new(DeviceId::Adc, "ADC", 3, false),
    Device::new(DeviceId::LcdScreen, "LCD_SCREEN", 4, false),
    Device::new(DeviceId::Accelerometer, "ACCELEROMETER", 5, false),
];
