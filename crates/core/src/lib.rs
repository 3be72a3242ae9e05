pub mod shared {
    pub mod bounding_box;
    pub mod config;
    pub mod constants;
    pub mod frame;
}

pub mod aiming {
    pub mod domain {
        pub mod actuator;
        pub mod aiming_controller;
        pub mod geometry;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod domain {
        pub mod frame_schedule;
        pub mod selection;
        pub mod tracking_engine;
    }
}

pub mod video {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod operator_input;
    pub mod session_logger;
    pub mod track_and_aim_use_case;
}
