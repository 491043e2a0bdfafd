binary_layout::binary_layout!(rdm_message_layout, BigEndian, {
    start_code: u8,
    sub_start_code: u8,
    message_length: u8,
    destination_uid: [u8; 6],
    source_uid: [u8; 6],
    transaction_number: u8,
    port_id_response_type: u8,
    message_count: u8,
    sub_device: u16,
    command_class: u8,
    parameter_id: u16,
    parameter_data_length: u8,
    parameter_data_and_checksum: [u8],
});

binary_layout::binary_layout!(rdm_device_info_layout, BigEndian, {
    protocol_version: u16,
    device_model_id: u16,
    product_category: u16,
    software_version_id: u32,
    dmx_footprint: u16,
    dmx_personality: u16,
    dmx_start_address: u16,
    sub_device_count: u16,
    sensor_count: u8,
});

binary_layout::binary_layout!(dmx_window_layout, BigEndian, {
    window_size: u16,
    start_address: u16,
});

binary_layout::binary_layout!(asc_frame_layout, BigEndian, {
    start_code: u8,
    asc_frame_length: u16,
});

binary_layout::binary_layout!(version_layout, BigEndian, {
    hardware_version: u32,
    software_version: u32,
});
