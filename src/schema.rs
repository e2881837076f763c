// Table definitions mirror the externally managed injection schema; this
// crate consumes it and ships no migrations.

diesel::table! {
    packet (id) {
        id -> Uuid,
        callsign_id -> Int8,
        create_ts -> Int8,
    }
}

diesel::table! {
    callsign (id) {
        id -> Int8,
        source -> Varchar,
    }
}

diesel::table! {
    object_name (id) {
        id -> Int8,
        name -> Varchar,
    }
}

diesel::table! {
    destination (id) {
        id -> Int8,
        name -> Varchar,
    }
}

diesel::table! {
    digis (id) {
        id -> Int8,
        name -> Varchar,
    }
}

diesel::table! {
    maidenhead (id) {
        id -> Int8,
        locator -> Varchar,
    }
}

diesel::table! {
    path (id) {
        id -> Int8,
        packet_id -> Uuid,
        body -> Varchar,
        create_ts -> Int8,
    }
}

diesel::table! {
    statuses (id) {
        id -> Int8,
        packet_id -> Uuid,
        body -> Varchar,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_position (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        icon_id -> Nullable<Int8>,
        locator -> Varchar,
        latitude -> Float8,
        longitude -> Float8,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_position_meta (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        dest_id -> Int8,
        course -> Nullable<Int4>,
        speed -> Nullable<Int4>,
        altitude -> Nullable<Int4>,
        symbol_table -> Nullable<Varchar>,
        symbol_code -> Nullable<Varchar>,
        overlay -> Nullable<Varchar>,
        range -> Nullable<Float8>,
        object_type -> Nullable<Varchar>,
        weather -> Varchar,
        telemetry -> Varchar,
        position_type_id -> Int2,
        mbits -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    position (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        maidenhead_id -> Int8,
        latitude -> Float8,
        longitude -> Float8,
        create_ts -> Int8,
    }
}

diesel::table! {
    position_meta (id) {
        id -> Int8,
        packet_id -> Uuid,
        course -> Nullable<Int4>,
        speed -> Nullable<Int4>,
        altitude -> Nullable<Int4>,
        symbol_table -> Nullable<Varchar>,
        symbol_code -> Nullable<Varchar>,
        time_of_fix -> Nullable<Int8>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_phg (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        power -> Nullable<Float8>,
        haat -> Nullable<Float8>,
        gain -> Nullable<Float8>,
        range -> Nullable<Float8>,
        direction -> Nullable<Int4>,
        beacon -> Nullable<Int4>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_dfr (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        bearing -> Nullable<Int4>,
        hits -> Nullable<Int4>,
        range -> Nullable<Float8>,
        quality -> Nullable<Int4>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_dfs (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        power -> Nullable<Float8>,
        haat -> Nullable<Float8>,
        gain -> Nullable<Float8>,
        range -> Nullable<Float8>,
        direction -> Nullable<Int4>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_frequency (callsign_id, name_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        name_id -> Int8,
        frequency -> Varchar,
        range -> Nullable<Float8>,
        range_east -> Nullable<Float8>,
        tone -> Nullable<Varchar>,
        afrs_type -> Nullable<Varchar>,
        receive -> Nullable<Varchar>,
        alternate -> Nullable<Varchar>,
        object_type -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_weather (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        latitude -> Float8,
        longitude -> Float8,
        wind_direction -> Nullable<Int4>,
        wind_speed -> Nullable<Int4>,
        wind_gust -> Nullable<Int4>,
        temperature -> Nullable<Int4>,
        rain_hour -> Nullable<Float8>,
        rain_calendar_day -> Nullable<Float8>,
        rain_24hour_day -> Nullable<Float8>,
        humidity -> Nullable<Int4>,
        barometer -> Nullable<Float8>,
        luminosity -> Nullable<Int4>,
        create_ts -> Int8,
    }
}

diesel::table! {
    weather (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        wind_direction -> Nullable<Int4>,
        wind_speed -> Nullable<Int4>,
        wind_gust -> Nullable<Int4>,
        temperature -> Nullable<Int4>,
        rain_hour -> Nullable<Float8>,
        rain_calendar_day -> Nullable<Float8>,
        rain_24hour_day -> Nullable<Float8>,
        humidity -> Nullable<Int4>,
        barometer -> Nullable<Float8>,
        luminosity -> Nullable<Int4>,
        create_ts -> Int8,
    }
}

diesel::table! {
    message (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        callsign_to_id -> Int8,
        body -> Varchar,
        msgid -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_message (callsign_id, callsign_to_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        callsign_to_id -> Int8,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_bulletin (callsign_id, addressee) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        addressee -> Varchar,
        text -> Nullable<Varchar>,
        msgid -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    telemetry_eqns (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        a_0 -> Nullable<Float8>,
        b_0 -> Nullable<Float8>,
        c_0 -> Nullable<Float8>,
        a_1 -> Nullable<Float8>,
        b_1 -> Nullable<Float8>,
        c_1 -> Nullable<Float8>,
        a_2 -> Nullable<Float8>,
        b_2 -> Nullable<Float8>,
        c_2 -> Nullable<Float8>,
        a_3 -> Nullable<Float8>,
        b_3 -> Nullable<Float8>,
        c_3 -> Nullable<Float8>,
        a_4 -> Nullable<Float8>,
        b_4 -> Nullable<Float8>,
        c_4 -> Nullable<Float8>,
        create_ts -> Int8,
    }
}

diesel::table! {
    telemetry_unit (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        a_0 -> Nullable<Varchar>,
        a_1 -> Nullable<Varchar>,
        a_2 -> Nullable<Varchar>,
        a_3 -> Nullable<Varchar>,
        a_4 -> Nullable<Varchar>,
        d_0 -> Nullable<Varchar>,
        d_1 -> Nullable<Varchar>,
        d_2 -> Nullable<Varchar>,
        d_3 -> Nullable<Varchar>,
        d_4 -> Nullable<Varchar>,
        d_5 -> Nullable<Varchar>,
        d_6 -> Nullable<Varchar>,
        d_7 -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    telemetry_parm (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        a_0 -> Nullable<Varchar>,
        a_1 -> Nullable<Varchar>,
        a_2 -> Nullable<Varchar>,
        a_3 -> Nullable<Varchar>,
        a_4 -> Nullable<Varchar>,
        d_0 -> Nullable<Varchar>,
        d_1 -> Nullable<Varchar>,
        d_2 -> Nullable<Varchar>,
        d_3 -> Nullable<Varchar>,
        d_4 -> Nullable<Varchar>,
        d_5 -> Nullable<Varchar>,
        d_6 -> Nullable<Varchar>,
        d_7 -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    telemetry_bits (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        bitsense -> Varchar,
        project_title -> Varchar,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_telemetry (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        sequence -> Nullable<Int4>,
        analog_0 -> Nullable<Float8>,
        analog_1 -> Nullable<Float8>,
        analog_2 -> Nullable<Float8>,
        analog_3 -> Nullable<Float8>,
        analog_4 -> Nullable<Float8>,
        digital -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    telemetry (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        sequence -> Nullable<Int4>,
        analog_0 -> Nullable<Float8>,
        analog_1 -> Nullable<Float8>,
        analog_2 -> Nullable<Float8>,
        analog_3 -> Nullable<Float8>,
        analog_4 -> Nullable<Float8>,
        digital -> Nullable<Varchar>,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_raw (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        information -> Varchar,
        create_ts -> Int8,
    }
}

diesel::table! {
    last_raw_meta (callsign_id) {
        packet_id -> Uuid,
        callsign_id -> Int8,
        dest_id -> Int8,
        digi0_id -> Int8,
        digi1_id -> Int8,
        digi2_id -> Int8,
        digi3_id -> Int8,
        digi4_id -> Int8,
        digi5_id -> Int8,
        digi6_id -> Int8,
        digi7_id -> Int8,
        create_ts -> Int8,
    }
}

diesel::table! {
    raw (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        information -> Varchar,
        create_ts -> Int8,
    }
}

diesel::table! {
    raw_meta (id) {
        id -> Int8,
        packet_id -> Uuid,
        callsign_id -> Int8,
        dest_id -> Int8,
        digi0_id -> Int8,
        digi1_id -> Int8,
        digi2_id -> Int8,
        digi3_id -> Int8,
        digi4_id -> Int8,
        digi5_id -> Int8,
        digi6_id -> Int8,
        digi7_id -> Int8,
        create_ts -> Int8,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    packet,
    callsign,
    object_name,
    destination,
    digis,
    maidenhead,
    path,
    statuses,
    last_position,
    last_position_meta,
    position,
    position_meta,
    last_phg,
    last_dfr,
    last_dfs,
    last_frequency,
    last_weather,
    weather,
    message,
    last_message,
    last_bulletin,
    telemetry_eqns,
    telemetry_unit,
    telemetry_parm,
    telemetry_bits,
    last_telemetry,
    telemetry,
    last_raw,
    last_raw_meta,
    raw,
    raw_meta,
);
