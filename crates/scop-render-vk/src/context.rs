// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use scop_render::WindowSurface;
use tracing::{debug, info, warn};

use crate::debug::{self, DebugMessenger, VALIDATION_LAYER};
use crate::utils::QueueFamilyIndices;
use crate::VkError;

#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub app_name: String,
    pub validation: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            app_name: "scop".to_owned(),
            validation: cfg!(debug_assertions),
        }
    }
}

/// Window surface plus the loader needed to query and destroy it.
pub struct Surface {
    pub(crate) loader: surface::Instance,
    pub(crate) handle: vk::SurfaceKHR,
}

impl Surface {
    pub(crate) unsafe fn destroy(self) {
        self.loader.destroy_surface(self.handle, None);
    }
}

/// What a physical device offers, reduced to the selection criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSupport {
    pub swapchain_extension: bool,
    pub queues: QueueFamilyIndices,
    pub sampler_anisotropy: bool,
    pub surface_formats: usize,
    pub present_modes: usize,
}

impl DeviceSupport {
    pub fn is_suitable(&self) -> bool {
        self.swapchain_extension
            && self.queues.complete().is_some()
            && self.sampler_anisotropy
            && self.surface_formats > 0
            && self.present_modes > 0
    }
}

/// Instance, debug hooks, selected GPU and logical device with its queues.
pub struct DeviceContext {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,

    physical: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory: vk::PhysicalDeviceMemoryProperties,
    non_solid_fill: bool,

    device: ash::Device,
    graphics_family: u32,
    present_family: u32,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    destroyed: bool,
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    options: &DeviceOptions,
) -> Result<Instance> {
    let app_name = CString::new(options.app_name.as_str()).unwrap_or_else(|_| c"scop".to_owned());

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: vk::make_api_version(0, 0, 1, 0),
        p_engine_name: c"scop".as_ptr(),
        engine_version: vk::make_api_version(0, 0, 1, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    let mut layers: Vec<*const c_char> = Vec::new();
    if options.validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };

    Ok(entry
        .create_instance(&create_info, None)
        .context("create_instance")?)
}

unsafe fn query_support(
    instance: &Instance,
    surface: &Surface,
    phys: vk::PhysicalDevice,
) -> Result<DeviceSupport> {
    let swapchain_extension = instance
        .enumerate_device_extension_properties(phys)
        .context("enumerate_device_extension_properties")?
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME);

    let families = instance.get_physical_device_queue_family_properties(phys);
    let queues = QueueFamilyIndices::find(&families, |i| {
        surface
            .loader
            .get_physical_device_surface_support(phys, i, surface.handle)
            .unwrap_or(false)
    });

    let features = instance.get_physical_device_features(phys);

    // Surface queries only make sense once the swapchain extension exists.
    let (surface_formats, present_modes) = if swapchain_extension {
        (
            surface
                .loader
                .get_physical_device_surface_formats(phys, surface.handle)
                .map(|f| f.len())
                .unwrap_or(0),
            surface
                .loader
                .get_physical_device_surface_present_modes(phys, surface.handle)
                .map(|m| m.len())
                .unwrap_or(0),
        )
    } else {
        (0, 0)
    };

    Ok(DeviceSupport {
        swapchain_extension,
        queues,
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        surface_formats,
        present_modes,
    })
}

unsafe fn select_physical_device(
    instance: &Instance,
    surface: &Surface,
) -> Result<(vk::PhysicalDevice, u32, u32)> {
    let devices = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    let candidates = devices.into_iter().map(|phys| {
        let props = instance.get_physical_device_properties(phys);
        let name = CStr::from_ptr(props.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();
        (phys, name, query_support(instance, surface, phys))
    });
    first_suitable(candidates).ok_or_else(|| VkError::NoSuitableDevice.into())
}

/// First candidate meeting every requirement, with its queue families. A
/// device whose surface queries fail is skipped.
fn first_suitable<T>(
    candidates: impl IntoIterator<Item = (T, String, Result<DeviceSupport>)>,
) -> Option<(T, u32, u32)> {
    for (device, name, support) in candidates {
        let support = match support {
            Ok(s) => s,
            Err(e) => {
                warn!("skipping `{name}`: {e:#}");
                continue;
            }
        };
        debug!("candidate `{name}`: {support:?}");
        if !support.is_suitable() {
            continue;
        }
        if let Some((graphics, present)) = support.queues.complete() {
            return Some((device, graphics, present));
        }
    }
    None
}

unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: &QueueFamilyIndices,
    non_solid_fill: bool,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures {
        sampler_anisotropy: vk::TRUE,
        fill_mode_non_solid: if non_solid_fill { vk::TRUE } else { vk::FALSE },
        ..Default::default()
    };

    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    Ok(instance
        .create_device(phys, &dinfo, None)
        .context("create_device")?)
}

impl DeviceContext {
    /// Brings up instance, surface and device. On failure nothing survives.
    pub fn new(window: &dyn WindowSurface, options: &DeviceOptions) -> Result<(Self, Surface)> {
        let dh: RawDisplayHandle = window
            .display_handle()
            .map_err(|e| anyhow!("display_handle: {e}"))?
            .as_raw();
        let wh: RawWindowHandle = window
            .window_handle()
            .map_err(|e| anyhow!("window_handle: {e}"))?
            .as_raw();

        unsafe {
            let entry = Entry::linked();

            if options.validation && !debug::validation_available(&entry)? {
                return Err(VkError::MissingValidationLayer(
                    VALIDATION_LAYER.to_string_lossy().into_owned(),
                )
                .into());
            }

            // STRICT ORDER:
            // instance -> debug messenger -> surface -> physical device -> device.
            // Every early return below unwinds what was created before it.
            let instance = create_instance(&entry, dh, options)?;

            let debug = if options.validation {
                match DebugMessenger::new(&entry, &instance) {
                    Ok(d) => Some(d),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let abort = |surface: Option<Surface>, debug: Option<DebugMessenger>| {
                if let Some(s) = surface {
                    s.destroy();
                }
                if let Some(d) = debug {
                    d.destroy();
                }
                instance.destroy_instance(None);
            };

            let loader = surface::Instance::new(&entry, &instance);
            let handle = match ash_window::create_surface(&entry, &instance, dh, wh, None) {
                Ok(h) => h,
                Err(e) => {
                    abort(None, debug);
                    return Err(anyhow!("create_surface: {e}"));
                }
            };
            let surface = Surface { loader, handle };

            let (physical, graphics_family, present_family) =
                match select_physical_device(&instance, &surface) {
                    Ok(sel) => sel,
                    Err(e) => {
                        abort(Some(surface), debug);
                        return Err(e);
                    }
                };

            let properties = instance.get_physical_device_properties(physical);
            let memory = instance.get_physical_device_memory_properties(physical);
            let non_solid_fill =
                instance.get_physical_device_features(physical).fill_mode_non_solid == vk::TRUE;

            let families = QueueFamilyIndices {
                graphics: Some(graphics_family),
                present: Some(present_family),
            };
            let device = match create_logical_device(&instance, physical, &families, non_solid_fill) {
                Ok(d) => d,
                Err(e) => {
                    abort(Some(surface), debug);
                    return Err(e);
                }
            };
            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);

            info!(
                "GPU: {} ({:?}), graphics family {}, present family {}",
                CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy(),
                properties.device_type,
                graphics_family,
                present_family
            );

            Ok((
                Self {
                    entry,
                    instance,
                    debug,
                    physical,
                    properties,
                    memory,
                    non_solid_fill,
                    device,
                    graphics_family,
                    present_family,
                    graphics_queue,
                    present_queue,
                    destroyed: false,
                },
                surface,
            ))
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
    pub fn device(&self) -> &ash::Device {
        &self.device
    }
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical
    }
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory
    }
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
    pub fn supports_non_solid_fill(&self) -> bool {
        self.non_solid_fill
    }
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }
    pub fn present_family(&self) -> u32 {
        self.present_family
    }
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }

    /// Device, debug messenger, instance. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        unsafe {
            self.device.destroy_device(None);
            if let Some(d) = self.debug.take() {
                d.destroy();
            }
            self.instance.destroy_instance(None);
        }
        debug!("device context destroyed");
    }
}
